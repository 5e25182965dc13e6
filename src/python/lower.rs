//! Lowering from the third-party typed AST into the generic grammar
//! tree. Field names and their order follow the grammar declaration
//! exactly; literal constants are stringified here, while the source
//! still knows their precise kind.

use rustpython_parser::ast::{
    Alias, Arg, Arguments, Boolop, Cmpop, Comprehension, Excepthandler, ExcepthandlerKind, Expr,
    ExprContext, ExprKind, Keyword, MatchCase, Operator, Pattern, PatternKind, Stmt, StmtKind,
    Unaryop, Withitem,
};

use crate::python::{repr::constant_repr, span_of};
use crate::tree::{Node, NodeId, Tree, Value};

/// Lower a parsed module body into a tree rooted at `Module`.
pub fn lower_module(body: &[Stmt]) -> Tree {
    let mut lowerer = Lowerer { tree: Tree::new() };
    let body = lowerer.stmt_list(body);
    let mut module = Node::new("Module");
    module.push_field("body", body);
    module.push_field("type_ignores", Value::List(Vec::new()));
    let root = lowerer.tree.push(module);
    lowerer.tree.set_root(root);
    lowerer.tree
}

struct Lowerer {
    tree: Tree,
}

impl Lowerer {
    fn push(&mut self, node: Node) -> NodeId {
        self.tree.push(node)
    }

    fn stmt_list(&mut self, stmts: &[Stmt]) -> Value {
        Value::List(stmts.iter().map(|stmt| self.stmt(stmt)).collect())
    }

    fn expr_list(&mut self, exprs: &[Expr]) -> Value {
        Value::List(exprs.iter().map(|expr| self.expr(expr)).collect())
    }

    fn opt_expr(&mut self, expr: &Option<Box<Expr>>) -> Value {
        match expr {
            Some(expr) => self.expr(expr),
            None => Value::None,
        }
    }

    fn ident_list(&mut self, names: &[String]) -> Value {
        Value::List(names.iter().map(|name| Value::Str(name.clone())).collect())
    }

    fn opt_ident(&mut self, name: &Option<String>) -> Value {
        match name {
            Some(name) => Value::Str(name.clone()),
            None => Value::None,
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> Value {
        let mut node = match &stmt.node {
            StmtKind::FunctionDef {
                name,
                args,
                body,
                decorator_list,
                returns,
                type_comment,
            } => {
                let mut node = Node::new("FunctionDef");
                node.push_field("name", Value::Str(name.clone()));
                let args = self.arguments(args);
                node.push_field("args", args);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let decorators = self.expr_list(decorator_list);
                node.push_field("decorator_list", decorators);
                let returns = self.opt_expr(returns);
                node.push_field("returns", returns);
                let type_comment = self.opt_ident(type_comment);
                node.push_field("type_comment", type_comment);
                node
            }
            StmtKind::AsyncFunctionDef {
                name,
                args,
                body,
                decorator_list,
                returns,
                type_comment,
            } => {
                let mut node = Node::new("AsyncFunctionDef");
                node.push_field("name", Value::Str(name.clone()));
                let args = self.arguments(args);
                node.push_field("args", args);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let decorators = self.expr_list(decorator_list);
                node.push_field("decorator_list", decorators);
                let returns = self.opt_expr(returns);
                node.push_field("returns", returns);
                let type_comment = self.opt_ident(type_comment);
                node.push_field("type_comment", type_comment);
                node
            }
            StmtKind::ClassDef {
                name,
                bases,
                keywords,
                body,
                decorator_list,
            } => {
                let mut node = Node::new("ClassDef");
                node.push_field("name", Value::Str(name.clone()));
                let bases = self.expr_list(bases);
                node.push_field("bases", bases);
                let keywords = self.keyword_list(keywords);
                node.push_field("keywords", keywords);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let decorators = self.expr_list(decorator_list);
                node.push_field("decorator_list", decorators);
                node
            }
            StmtKind::Return { value } => {
                let mut node = Node::new("Return");
                let value = self.opt_expr(value);
                node.push_field("value", value);
                node
            }
            StmtKind::Delete { targets } => {
                let mut node = Node::new("Delete");
                let targets = self.expr_list(targets);
                node.push_field("targets", targets);
                node
            }
            StmtKind::Assign {
                targets,
                value,
                type_comment,
            } => {
                let mut node = Node::new("Assign");
                let targets = self.expr_list(targets);
                node.push_field("targets", targets);
                let value = self.expr(value);
                node.push_field("value", value);
                let type_comment = self.opt_ident(type_comment);
                node.push_field("type_comment", type_comment);
                node
            }
            StmtKind::AugAssign { target, op, value } => {
                let mut node = Node::new("AugAssign");
                let target = self.expr(target);
                node.push_field("target", target);
                node.push_field("op", operator_value(op));
                let value = self.expr(value);
                node.push_field("value", value);
                node
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
                simple,
            } => {
                let mut node = Node::new("AnnAssign");
                let target = self.expr(target);
                node.push_field("target", target);
                let annotation = self.expr(annotation);
                node.push_field("annotation", annotation);
                let value = self.opt_expr(value);
                node.push_field("value", value);
                node.push_field("simple", Value::Int(*simple as i64));
                node
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
                type_comment,
            } => {
                let mut node = Node::new("For");
                let target = self.expr(target);
                node.push_field("target", target);
                let iter = self.expr(iter);
                node.push_field("iter", iter);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let orelse = self.stmt_list(orelse);
                node.push_field("orelse", orelse);
                let type_comment = self.opt_ident(type_comment);
                node.push_field("type_comment", type_comment);
                node
            }
            StmtKind::AsyncFor {
                target,
                iter,
                body,
                orelse,
                type_comment,
            } => {
                let mut node = Node::new("AsyncFor");
                let target = self.expr(target);
                node.push_field("target", target);
                let iter = self.expr(iter);
                node.push_field("iter", iter);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let orelse = self.stmt_list(orelse);
                node.push_field("orelse", orelse);
                let type_comment = self.opt_ident(type_comment);
                node.push_field("type_comment", type_comment);
                node
            }
            StmtKind::While { test, body, orelse } => {
                let mut node = Node::new("While");
                let test = self.expr(test);
                node.push_field("test", test);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let orelse = self.stmt_list(orelse);
                node.push_field("orelse", orelse);
                node
            }
            StmtKind::If { test, body, orelse } => {
                let mut node = Node::new("If");
                let test = self.expr(test);
                node.push_field("test", test);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let orelse = self.stmt_list(orelse);
                node.push_field("orelse", orelse);
                node
            }
            StmtKind::With {
                items,
                body,
                type_comment,
            } => {
                let mut node = Node::new("With");
                let items = self.withitem_list(items);
                node.push_field("items", items);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let type_comment = self.opt_ident(type_comment);
                node.push_field("type_comment", type_comment);
                node
            }
            StmtKind::AsyncWith {
                items,
                body,
                type_comment,
            } => {
                let mut node = Node::new("AsyncWith");
                let items = self.withitem_list(items);
                node.push_field("items", items);
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let type_comment = self.opt_ident(type_comment);
                node.push_field("type_comment", type_comment);
                node
            }
            StmtKind::Match { subject, cases } => {
                let mut node = Node::new("Match");
                let subject = self.expr(subject);
                node.push_field("subject", subject);
                let cases = self.match_case_list(cases);
                node.push_field("cases", cases);
                node
            }
            StmtKind::Raise { exc, cause } => {
                let mut node = Node::new("Raise");
                let exc = self.opt_expr(exc);
                node.push_field("exc", exc);
                let cause = self.opt_expr(cause);
                node.push_field("cause", cause);
                node
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let mut node = Node::new("Try");
                let body = self.stmt_list(body);
                node.push_field("body", body);
                let handlers = self.excepthandler_list(handlers);
                node.push_field("handlers", handlers);
                let orelse = self.stmt_list(orelse);
                node.push_field("orelse", orelse);
                let finalbody = self.stmt_list(finalbody);
                node.push_field("finalbody", finalbody);
                node
            }
            StmtKind::Assert { test, msg } => {
                let mut node = Node::new("Assert");
                let test = self.expr(test);
                node.push_field("test", test);
                let msg = self.opt_expr(msg);
                node.push_field("msg", msg);
                node
            }
            StmtKind::Import { names } => {
                let mut node = Node::new("Import");
                let names = self.alias_list(names);
                node.push_field("names", names);
                node
            }
            StmtKind::ImportFrom {
                module,
                names,
                level,
            } => {
                let mut node = Node::new("ImportFrom");
                let module = self.opt_ident(module);
                node.push_field("module", module);
                let names = self.alias_list(names);
                node.push_field("names", names);
                let level = match level {
                    Some(level) => Value::Int(*level as i64),
                    None => Value::None,
                };
                node.push_field("level", level);
                node
            }
            StmtKind::Global { names } => {
                let mut node = Node::new("Global");
                let names = self.ident_list(names);
                node.push_field("names", names);
                node
            }
            StmtKind::Nonlocal { names } => {
                let mut node = Node::new("Nonlocal");
                let names = self.ident_list(names);
                node.push_field("names", names);
                node
            }
            StmtKind::Expr { value } => {
                let mut node = Node::new("Expr");
                let value = self.expr(value);
                node.push_field("value", value);
                node
            }
            StmtKind::Pass => Node::new("Pass"),
            StmtKind::Break => Node::new("Break"),
            StmtKind::Continue => Node::new("Continue"),
        };
        node.span = Some(span_of(stmt));
        Value::Node(self.push(node))
    }

    fn expr(&mut self, expr: &Expr) -> Value {
        let mut node = match &expr.node {
            ExprKind::BoolOp { op, values } => {
                let mut node = Node::new("BoolOp");
                node.push_field("op", boolop_value(op));
                let values = self.expr_list(values);
                node.push_field("values", values);
                node
            }
            ExprKind::NamedExpr { target, value } => {
                let mut node = Node::new("NamedExpr");
                let target = self.expr(target);
                node.push_field("target", target);
                let value = self.expr(value);
                node.push_field("value", value);
                node
            }
            ExprKind::BinOp { left, op, right } => {
                let mut node = Node::new("BinOp");
                let left = self.expr(left);
                node.push_field("left", left);
                node.push_field("op", operator_value(op));
                let right = self.expr(right);
                node.push_field("right", right);
                node
            }
            ExprKind::UnaryOp { op, operand } => {
                let mut node = Node::new("UnaryOp");
                node.push_field("op", unaryop_value(op));
                let operand = self.expr(operand);
                node.push_field("operand", operand);
                node
            }
            ExprKind::Lambda { args, body } => {
                let mut node = Node::new("Lambda");
                let args = self.arguments(args);
                node.push_field("args", args);
                let body = self.expr(body);
                node.push_field("body", body);
                node
            }
            ExprKind::IfExp { test, body, orelse } => {
                let mut node = Node::new("IfExp");
                let test = self.expr(test);
                node.push_field("test", test);
                let body = self.expr(body);
                node.push_field("body", body);
                let orelse = self.expr(orelse);
                node.push_field("orelse", orelse);
                node
            }
            ExprKind::Dict { keys, values } => {
                let mut node = Node::new("Dict");
                let keys = Value::List(keys.iter().map(|key| self.expr(key)).collect());
                node.push_field("keys", keys);
                let values = self.expr_list(values);
                node.push_field("values", values);
                node
            }
            ExprKind::Set { elts } => {
                let mut node = Node::new("Set");
                let elts = self.expr_list(elts);
                node.push_field("elts", elts);
                node
            }
            ExprKind::ListComp { elt, generators } => {
                let mut node = Node::new("ListComp");
                let elt = self.expr(elt);
                node.push_field("elt", elt);
                let generators = self.comprehension_list(generators);
                node.push_field("generators", generators);
                node
            }
            ExprKind::SetComp { elt, generators } => {
                let mut node = Node::new("SetComp");
                let elt = self.expr(elt);
                node.push_field("elt", elt);
                let generators = self.comprehension_list(generators);
                node.push_field("generators", generators);
                node
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                let mut node = Node::new("DictComp");
                let key = self.expr(key);
                node.push_field("key", key);
                let value = self.expr(value);
                node.push_field("value", value);
                let generators = self.comprehension_list(generators);
                node.push_field("generators", generators);
                node
            }
            ExprKind::GeneratorExp { elt, generators } => {
                let mut node = Node::new("GeneratorExp");
                let elt = self.expr(elt);
                node.push_field("elt", elt);
                let generators = self.comprehension_list(generators);
                node.push_field("generators", generators);
                node
            }
            ExprKind::Await { value } => {
                let mut node = Node::new("Await");
                let value = self.expr(value);
                node.push_field("value", value);
                node
            }
            ExprKind::Yield { value } => {
                let mut node = Node::new("Yield");
                let value = self.opt_expr(value);
                node.push_field("value", value);
                node
            }
            ExprKind::YieldFrom { value } => {
                let mut node = Node::new("YieldFrom");
                let value = self.expr(value);
                node.push_field("value", value);
                node
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut node = Node::new("Compare");
                let left = self.expr(left);
                node.push_field("left", left);
                node.push_field("ops", Value::List(ops.iter().map(cmpop_value).collect()));
                let comparators = self.expr_list(comparators);
                node.push_field("comparators", comparators);
                node
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let mut node = Node::new("Call");
                let func = self.expr(func);
                node.push_field("func", func);
                let args = self.expr_list(args);
                node.push_field("args", args);
                let keywords = self.keyword_list(keywords);
                node.push_field("keywords", keywords);
                node
            }
            ExprKind::FormattedValue {
                value,
                conversion,
                format_spec,
            } => {
                let mut node = Node::new("FormattedValue");
                let value = self.expr(value);
                node.push_field("value", value);
                let conversion = if *conversion == 0 {
                    Value::None
                } else {
                    Value::Int(*conversion as i64)
                };
                node.push_field("conversion", conversion);
                let format_spec = self.opt_expr(format_spec);
                node.push_field("format_spec", format_spec);
                node
            }
            ExprKind::JoinedStr { values } => {
                let mut node = Node::new("JoinedStr");
                let values = self.expr_list(values);
                node.push_field("values", values);
                node
            }
            ExprKind::Constant { value, kind } => {
                let mut node = Node::new("Constant");
                node.push_field("value", Value::Str(constant_repr(value)));
                let kind = self.opt_ident(kind);
                node.push_field("kind", kind);
                node
            }
            ExprKind::Attribute { value, attr, ctx } => {
                let mut node = Node::new("Attribute");
                let value = self.expr(value);
                node.push_field("value", value);
                node.push_field("attr", Value::Str(attr.clone()));
                node.push_field("ctx", ctx_value(ctx));
                node
            }
            ExprKind::Subscript { value, slice, ctx } => {
                let mut node = Node::new("Subscript");
                let value = self.expr(value);
                node.push_field("value", value);
                let slice = self.expr(slice);
                node.push_field("slice", slice);
                node.push_field("ctx", ctx_value(ctx));
                node
            }
            ExprKind::Starred { value, ctx } => {
                let mut node = Node::new("Starred");
                let value = self.expr(value);
                node.push_field("value", value);
                node.push_field("ctx", ctx_value(ctx));
                node
            }
            ExprKind::Name { id, ctx } => {
                let mut node = Node::new("Name");
                node.push_field("id", Value::Str(id.clone()));
                node.push_field("ctx", ctx_value(ctx));
                node
            }
            ExprKind::List { elts, ctx } => {
                let mut node = Node::new("List");
                let elts = self.expr_list(elts);
                node.push_field("elts", elts);
                node.push_field("ctx", ctx_value(ctx));
                node
            }
            ExprKind::Tuple { elts, ctx } => {
                let mut node = Node::new("Tuple");
                let elts = self.expr_list(elts);
                node.push_field("elts", elts);
                node.push_field("ctx", ctx_value(ctx));
                node
            }
            ExprKind::Slice { lower, upper, step } => {
                let mut node = Node::new("Slice");
                let lower = self.opt_expr(lower);
                node.push_field("lower", lower);
                let upper = self.opt_expr(upper);
                node.push_field("upper", upper);
                let step = self.opt_expr(step);
                node.push_field("step", step);
                node
            }
        };
        node.span = Some(span_of(expr));
        Value::Node(self.push(node))
    }

    fn arguments(&mut self, arguments: &Arguments) -> Value {
        let mut node = Node::new("arguments");
        let posonlyargs = self.arg_list(&arguments.posonlyargs);
        node.push_field("posonlyargs", posonlyargs);
        let args = self.arg_list(&arguments.args);
        node.push_field("args", args);
        let vararg = match &arguments.vararg {
            Some(arg) => self.arg(arg),
            None => Value::None,
        };
        node.push_field("vararg", vararg);
        let kwonlyargs = self.arg_list(&arguments.kwonlyargs);
        node.push_field("kwonlyargs", kwonlyargs);
        let kw_defaults = self.expr_list(&arguments.kw_defaults);
        node.push_field("kw_defaults", kw_defaults);
        let kwarg = match &arguments.kwarg {
            Some(arg) => self.arg(arg),
            None => Value::None,
        };
        node.push_field("kwarg", kwarg);
        let defaults = self.expr_list(&arguments.defaults);
        node.push_field("defaults", defaults);
        Value::Node(self.push(node))
    }

    fn arg_list(&mut self, args: &[Arg]) -> Value {
        Value::List(args.iter().map(|arg| self.arg(arg)).collect())
    }

    fn arg(&mut self, arg: &Arg) -> Value {
        let mut node = Node::new("arg");
        node.push_field("arg", Value::Str(arg.node.arg.clone()));
        let annotation = self.opt_expr(&arg.node.annotation);
        node.push_field("annotation", annotation);
        let type_comment = self.opt_ident(&arg.node.type_comment);
        node.push_field("type_comment", type_comment);
        node.span = Some(span_of(arg));
        Value::Node(self.push(node))
    }

    fn keyword_list(&mut self, keywords: &[Keyword]) -> Value {
        Value::List(
            keywords
                .iter()
                .map(|keyword| {
                    let mut node = Node::new("keyword");
                    let arg = self.opt_ident(&keyword.node.arg);
                    node.push_field("arg", arg);
                    let value = self.expr(&keyword.node.value);
                    node.push_field("value", value);
                    node.span = Some(span_of(keyword));
                    Value::Node(self.push(node))
                })
                .collect(),
        )
    }

    fn alias_list(&mut self, aliases: &[Alias]) -> Value {
        Value::List(
            aliases
                .iter()
                .map(|alias| {
                    let mut node = Node::new("alias");
                    node.push_field("name", Value::Str(alias.node.name.clone()));
                    let asname = self.opt_ident(&alias.node.asname);
                    node.push_field("asname", asname);
                    Value::Node(self.push(node))
                })
                .collect(),
        )
    }

    fn withitem_list(&mut self, items: &[Withitem]) -> Value {
        Value::List(
            items
                .iter()
                .map(|item| {
                    let mut node = Node::new("withitem");
                    let context_expr = self.expr(&item.context_expr);
                    node.push_field("context_expr", context_expr);
                    let optional_vars = self.opt_expr(&item.optional_vars);
                    node.push_field("optional_vars", optional_vars);
                    Value::Node(self.push(node))
                })
                .collect(),
        )
    }

    fn comprehension_list(&mut self, generators: &[Comprehension]) -> Value {
        Value::List(
            generators
                .iter()
                .map(|generator| {
                    let mut node = Node::new("comprehension");
                    let target = self.expr(&generator.target);
                    node.push_field("target", target);
                    let iter = self.expr(&generator.iter);
                    node.push_field("iter", iter);
                    let ifs = self.expr_list(&generator.ifs);
                    node.push_field("ifs", ifs);
                    node.push_field("is_async", Value::Int(generator.is_async as i64));
                    Value::Node(self.push(node))
                })
                .collect(),
        )
    }

    fn excepthandler_list(&mut self, handlers: &[Excepthandler]) -> Value {
        Value::List(
            handlers
                .iter()
                .map(|handler| {
                    let ExcepthandlerKind::ExceptHandler { type_, name, body } = &handler.node;
                    let mut node = Node::new("ExceptHandler");
                    let type_value = self.opt_expr(type_);
                    node.push_field("type", type_value);
                    let name = self.opt_ident(name);
                    node.push_field("name", name);
                    let body = self.stmt_list(body);
                    node.push_field("body", body);
                    node.span = Some(span_of(handler));
                    Value::Node(self.push(node))
                })
                .collect(),
        )
    }

    fn match_case_list(&mut self, cases: &[MatchCase]) -> Value {
        Value::List(
            cases
                .iter()
                .map(|case| {
                    let mut node = Node::new("match_case");
                    let pattern = self.pattern(&case.pattern);
                    node.push_field("pattern", pattern);
                    let guard = self.opt_expr(&case.guard);
                    node.push_field("guard", guard);
                    let body = self.stmt_list(&case.body);
                    node.push_field("body", body);
                    Value::Node(self.push(node))
                })
                .collect(),
        )
    }

    fn pattern_list(&mut self, patterns: &[Pattern]) -> Value {
        Value::List(
            patterns
                .iter()
                .map(|pattern| self.pattern(pattern))
                .collect(),
        )
    }

    fn pattern(&mut self, pattern: &Pattern) -> Value {
        let mut node = match &pattern.node {
            PatternKind::MatchValue { value } => {
                let mut node = Node::new("MatchValue");
                let value = self.expr(value);
                node.push_field("value", value);
                node
            }
            PatternKind::MatchSingleton { value } => {
                let mut node = Node::new("MatchSingleton");
                node.push_field("value", Value::Str(constant_repr(value)));
                node
            }
            PatternKind::MatchSequence { patterns } => {
                let mut node = Node::new("MatchSequence");
                let patterns = self.pattern_list(patterns);
                node.push_field("patterns", patterns);
                node
            }
            PatternKind::MatchMapping {
                keys,
                patterns,
                rest,
            } => {
                let mut node = Node::new("MatchMapping");
                let keys = self.expr_list(keys);
                node.push_field("keys", keys);
                let patterns = self.pattern_list(patterns);
                node.push_field("patterns", patterns);
                let rest = self.opt_ident(rest);
                node.push_field("rest", rest);
                node
            }
            PatternKind::MatchClass {
                cls,
                patterns,
                kwd_attrs,
                kwd_patterns,
            } => {
                let mut node = Node::new("MatchClass");
                let cls = self.expr(cls);
                node.push_field("cls", cls);
                let patterns = self.pattern_list(patterns);
                node.push_field("patterns", patterns);
                let kwd_attrs = self.ident_list(kwd_attrs);
                node.push_field("kwd_attrs", kwd_attrs);
                let kwd_patterns = self.pattern_list(kwd_patterns);
                node.push_field("kwd_patterns", kwd_patterns);
                node
            }
            PatternKind::MatchStar { name } => {
                let mut node = Node::new("MatchStar");
                let name = self.opt_ident(name);
                node.push_field("name", name);
                node
            }
            PatternKind::MatchAs { pattern, name } => {
                let mut node = Node::new("MatchAs");
                let inner = match pattern {
                    Some(pattern) => self.pattern(pattern),
                    None => Value::None,
                };
                node.push_field("pattern", inner);
                let name = self.opt_ident(name);
                node.push_field("name", name);
                node
            }
            PatternKind::MatchOr { patterns } => {
                let mut node = Node::new("MatchOr");
                let patterns = self.pattern_list(patterns);
                node.push_field("patterns", patterns);
                node
            }
        };
        node.span = Some(span_of(pattern));
        Value::Node(self.push(node))
    }
}

fn enum_value(base: &str, member: &str) -> Value {
    Value::Enum {
        base: base.to_owned(),
        member: member.to_owned(),
    }
}

fn ctx_value(ctx: &ExprContext) -> Value {
    let member = match ctx {
        ExprContext::Load => "Load",
        ExprContext::Store => "Store",
        ExprContext::Del => "Del",
    };
    enum_value("expr_context", member)
}

fn boolop_value(op: &Boolop) -> Value {
    let member = match op {
        Boolop::And => "And",
        Boolop::Or => "Or",
    };
    enum_value("boolop", member)
}

fn operator_value(op: &Operator) -> Value {
    let member = match op {
        Operator::Add => "Add",
        Operator::Sub => "Sub",
        Operator::Mult => "Mult",
        Operator::MatMult => "MatMult",
        Operator::Div => "Div",
        Operator::Mod => "Mod",
        Operator::Pow => "Pow",
        Operator::LShift => "LShift",
        Operator::RShift => "RShift",
        Operator::BitOr => "BitOr",
        Operator::BitXor => "BitXor",
        Operator::BitAnd => "BitAnd",
        Operator::FloorDiv => "FloorDiv",
    };
    enum_value("operator", member)
}

fn unaryop_value(op: &Unaryop) -> Value {
    let member = match op {
        Unaryop::Invert => "Invert",
        Unaryop::Not => "Not",
        Unaryop::UAdd => "UAdd",
        Unaryop::USub => "USub",
    };
    enum_value("unaryop", member)
}

fn cmpop_value(op: &Cmpop) -> Value {
    let member = match op {
        Cmpop::Eq => "Eq",
        Cmpop::NotEq => "NotEq",
        Cmpop::Lt => "Lt",
        Cmpop::LtE => "LtE",
        Cmpop::Gt => "Gt",
        Cmpop::GtE => "GtE",
        Cmpop::Is => "Is",
        Cmpop::IsNot => "IsNot",
        Cmpop::In => "In",
        Cmpop::NotIn => "NotIn",
    };
    enum_value("cmpop", member)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::parse_module;
    use crate::tree::Value;

    #[test]
    fn lowers_a_simple_module() {
        let tree = parse_module("x = 1\n", "<test>").unwrap();
        let root = tree.get(tree.root());
        assert_eq!(root.kind, "Module");
        let Some(Value::List(body)) = root.field("body") else {
            panic!("missing body");
        };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn constant_values_are_stringified() {
        let tree = parse_module("x = 'foo'\n", "<test>").unwrap();
        let constant = tree
            .ids()
            .find(|id| tree.get(*id).kind == "Constant")
            .unwrap();
        assert_eq!(
            tree.get(constant).field("value"),
            Some(&Value::Str("'foo'".to_owned()))
        );
    }

    #[test]
    fn enum_fields_carry_their_base() {
        let tree = parse_module("x = y\n", "<test>").unwrap();
        let name = tree
            .ids()
            .find(|id| {
                tree.get(*id).kind == "Name"
                    && tree.get(*id).field("id") == Some(&Value::Str("y".to_owned()))
            })
            .unwrap();
        assert_eq!(
            tree.get(name).field("ctx"),
            Some(&Value::Enum {
                base: "expr_context".to_owned(),
                member: "Load".to_owned()
            })
        );
    }

    #[test]
    fn field_order_matches_the_grammar() {
        let tree = parse_module("def f(a):\n    return a\n", "<test>").unwrap();
        let function = tree
            .ids()
            .find(|id| tree.get(*id).kind == "FunctionDef")
            .unwrap();
        let names: Vec<&str> = tree
            .get(function)
            .fields
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["name", "args", "body", "decorator_list", "returns", "type_comment"]
        );
    }

    #[test]
    fn spans_are_recorded() {
        let tree = parse_module("x = 1\n", "<test>").unwrap();
        let assign = tree
            .ids()
            .find(|id| tree.get(*id).kind == "Assign")
            .unwrap();
        let span = tree.get(assign).span.unwrap();
        assert_eq!(span.lineno, 1);
        assert_eq!(span.col_offset, 0);
    }
}
