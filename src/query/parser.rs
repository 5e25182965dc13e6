//! Folds the target-language parse tree of a query into the query
//! grammar. The query surface is one expression; every construct the
//! grammar does not know is rejected with the offending span.

use rustpython_parser::ast::{Constant as PyConstant, Expr, ExprKind, Unaryop};

use crate::grammar::NameKind;
use crate::python::{self, span_of};
use crate::query::grammar::{
    Ast, Builtin, Constant, ConstantValue, List, LogicOp, LogicalOperation, Match, MatchEnum,
    MatchString, Ref, SetMatch,
};
use crate::query::QueryError;
use crate::schema::Schema;
use crate::tree::Span;

pub const BUILTIN_FUNCTIONS: [&str; 5] = ["ALL", "ANY", "LEN", "I", "META"];

/// Parse a query source into its root matcher.
pub fn parse_query(source: &str, schema: &Schema) -> Result<Match, QueryError> {
    let expr = python::parse_expression(source, "<query>")
        .map_err(|error| QueryError::syntax(error.message, Some(error.span)))?;

    let parser = Parser { schema };
    let root = parser.parse(&expr)?;
    match root {
        Ast::Match(root) if root.positional => Ok(root),
        Ast::Match(root) => Err(QueryError::syntax(
            format!("'{}' cannot be matched at the top level", root.name),
            Some(root.span),
        )),
        _ => Err(QueryError::syntax(
            "a query must start with a matcher call",
            Some(span_of(&expr)),
        )),
    }
}

struct Parser<'a> {
    schema: &'a Schema,
}

impl<'a> Parser<'a> {
    fn parse(&self, node: &Expr) -> Result<Ast, QueryError> {
        let span = span_of(node);
        match &node.node {
            ExprKind::Call {
                func,
                args,
                keywords,
            } => self.parse_call(func, args, keywords, span),
            ExprKind::BinOp { left, op, right } => {
                let operator = match op {
                    rustpython_parser::ast::Operator::BitOr => LogicOp::Or,
                    rustpython_parser::ast::Operator::BitAnd => LogicOp::And,
                    other => {
                        return Err(QueryError::syntax(
                            format!("unknown logical operation: {other:?}"),
                            Some(span),
                        ))
                    }
                };
                Ok(Ast::LogicalOperation(Box::new(LogicalOperation {
                    left: self.parse(left)?,
                    right: self.parse(right)?,
                    operator,
                })))
            }
            ExprKind::UnaryOp { op, operand } => match op {
                Unaryop::Not => Ok(Ast::Not(Box::new(self.parse(operand)?))),
                Unaryop::Invert => match &operand.node {
                    ExprKind::Name { id, .. } => Ok(Ast::Ref(Ref {
                        name: id.clone(),
                        span,
                    })),
                    _ => Err(QueryError::syntax(
                        "a reference must be a plain name",
                        Some(span),
                    )),
                },
                other => Err(QueryError::syntax(
                    format!("unknown unary operator: {other:?}"),
                    Some(span),
                )),
            },
            ExprKind::Constant { value, .. } => self.parse_constant(value, span),
            ExprKind::List { elts, .. } => Ok(Ast::List(List {
                items: self.parse_all(elts)?,
                span,
            })),
            ExprKind::Set { elts } => Ok(Ast::Set(SetMatch {
                items: self.parse_all(elts)?,
                span,
            })),
            ExprKind::Starred { value, .. } => match &value.node {
                ExprKind::Constant {
                    value: PyConstant::Ellipsis,
                    ..
                } => Ok(Ast::Expand),
                _ => Err(QueryError::syntax(
                    "only '*...' may be starred inside a list match",
                    Some(span),
                )),
            },
            ExprKind::JoinedStr { values } => self.parse_match_string(values, span),
            _ => Err(QueryError::syntax("invalid syntax", Some(span))),
        }
    }

    fn parse_all(&self, nodes: &[Expr]) -> Result<Vec<Ast>, QueryError> {
        nodes.iter().map(|node| self.parse(node)).collect()
    }

    fn parse_call(
        &self,
        func: &Expr,
        args: &[Expr],
        keywords: &[rustpython_parser::ast::Keyword],
        span: Span,
    ) -> Result<Ast, QueryError> {
        let ExprKind::Name { id: name, .. } = &func.node else {
            return Err(QueryError::syntax(
                "matcher callee must be a plain name",
                Some(span_of(func)),
            ));
        };

        if BUILTIN_FUNCTIONS.contains(&name.as_str()) {
            let mut parsed_keywords = Vec::new();
            for keyword in keywords {
                let Some(arg) = &keyword.node.arg else {
                    return Err(QueryError::syntax(
                        "double-star arguments are not allowed",
                        Some(span),
                    ));
                };
                parsed_keywords.push((arg.clone(), self.parse(&keyword.node.value)?));
            }
            return Ok(Ast::Builtin(Builtin {
                name: name.clone(),
                args: self.parse_all(args)?,
                keywords: parsed_keywords,
                span,
            }));
        }

        match self.schema.model().name_kind(name) {
            Some(NameKind::EnumMember(base)) => {
                if !args.is_empty() || !keywords.is_empty() {
                    return Err(QueryError::syntax(
                        format!("'{name}' does not take arguments"),
                        Some(span),
                    ));
                }
                Ok(Ast::MatchEnum(MatchEnum {
                    base: base.clone(),
                    member: name.clone(),
                    span,
                }))
            }
            Some(NameKind::Constructor(_)) | Some(NameKind::Product) | Some(NameKind::Sum) => {
                self.parse_matcher(name, args, keywords, span)
            }
            _ => Err(QueryError::syntax(
                format!("unknown matcher: '{name}'"),
                Some(span),
            )),
        }
    }

    fn parse_matcher(
        &self,
        name: &str,
        args: &[Expr],
        keywords: &[rustpython_parser::ast::Keyword],
        span: Span,
    ) -> Result<Ast, QueryError> {
        // abstract sums have no declared fields but may still be
        // matched bare (`expr()` selects every expression)
        let declared = self.schema.model().fields_of(name).unwrap_or(&[]);

        let mut filters: Vec<(String, Ast)> = Vec::new();
        for (index, arg) in args.iter().enumerate() {
            let Some(field) = declared.get(index) else {
                return Err(QueryError::syntax(
                    format!("too many positional arguments for '{name}'"),
                    Some(span_of(arg)),
                ));
            };
            filters.push((field.name.clone(), self.parse(arg)?));
        }

        for keyword in keywords {
            let Some(arg) = &keyword.node.arg else {
                return Err(QueryError::syntax(
                    "double-star arguments are not allowed",
                    Some(span),
                ));
            };
            if filters.iter().any(|(bound, _)| bound == arg) {
                return Err(QueryError::syntax(
                    format!("'{arg}' specified with both positional and keyword arg"),
                    Some(span_of(keyword)),
                ));
            }
            filters.push((arg.clone(), self.parse(&keyword.node.value)?));
        }

        Ok(Ast::Match(Match {
            name: name.to_owned(),
            filters,
            positional: self.schema.model().has_position_attributes(name),
            span,
        }))
    }

    fn parse_constant(&self, value: &PyConstant, span: Span) -> Result<Ast, QueryError> {
        let value = match value {
            PyConstant::Ellipsis => return Ok(Ast::Ignore),
            PyConstant::None => return Ok(Ast::Cease),
            PyConstant::Str(value) => ConstantValue::Str(value.clone()),
            PyConstant::Bool(value) => ConstantValue::Bool(*value),
            PyConstant::Float(value) => ConstantValue::Float(*value),
            PyConstant::Int(value) => {
                let parsed = value.to_string().parse::<i64>().map_err(|_| {
                    QueryError::syntax("integer literal out of range", Some(span))
                })?;
                ConstantValue::Int(parsed)
            }
            other => {
                return Err(QueryError::syntax(
                    format!("unsupported literal: {other:?}"),
                    Some(span),
                ))
            }
        };
        Ok(Ast::Constant(Constant { value, span }))
    }

    /// f-strings become match strings; the pattern must be literal, so
    /// interpolation placeholders are rejected.
    fn parse_match_string(&self, values: &[Expr], span: Span) -> Result<Ast, QueryError> {
        let mut pattern = String::new();
        for value in values {
            match &value.node {
                ExprKind::Constant {
                    value: PyConstant::Str(part),
                    ..
                } => pattern.push_str(part),
                ExprKind::FormattedValue { .. } => {
                    return Err(QueryError::syntax(
                        "interpolation is not allowed in match strings",
                        Some(span_of(value)),
                    ))
                }
                _ => {
                    return Err(QueryError::syntax(
                        "invalid match string",
                        Some(span_of(value)),
                    ))
                }
            }
        }
        if pattern.is_empty() {
            return Err(QueryError::syntax(
                "empty match strings are not allowed",
                Some(span),
            ));
        }
        Ok(Ast::MatchString(MatchString { pattern, span }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::bootstrap().unwrap()
    }

    fn parse(source: &str) -> Result<Match, QueryError> {
        parse_query(source, &schema())
    }

    #[test]
    fn parses_a_bare_matcher() {
        let root = parse("Name()").unwrap();
        assert_eq!(root.name, "Name");
        assert!(root.filters.is_empty());
        assert!(root.positional);
    }

    #[test]
    fn binds_positional_arguments_in_field_order() {
        let root = parse("Name('foo')").unwrap();
        assert_eq!(root.filters.len(), 1);
        assert_eq!(root.filters[0].0, "id");
        assert!(matches!(root.filters[0].1, Ast::Constant(_)));
    }

    #[test]
    fn keyword_arguments_bind_by_name() {
        let root = parse("Name(ctx=Load())").unwrap();
        assert_eq!(root.filters[0].0, "ctx");
        let Ast::MatchEnum(member) = &root.filters[0].1 else {
            panic!("expected enum match");
        };
        assert_eq!(member.base, "expr_context");
        assert_eq!(member.member, "Load");
    }

    #[test]
    fn rejects_unknown_matchers() {
        let error = parse("Bogus()").unwrap_err();
        assert!(error.to_string().contains("unknown matcher"));
    }

    #[test]
    fn rejects_too_many_positional_arguments() {
        let error = parse("Name(..., ..., ...)").unwrap_err();
        assert!(error.to_string().contains("too many positional arguments"));
    }

    #[test]
    fn rejects_duplicate_bindings() {
        let error = parse("Name('x', id='y')").unwrap_err();
        assert!(error
            .to_string()
            .contains("specified with both positional and keyword arg"));
    }

    #[test]
    fn rejects_non_positional_roots() {
        let error = parse("arguments()").unwrap_err();
        assert!(error.to_string().contains("top level"));
    }

    #[test]
    fn parses_list_set_and_wildcards() {
        let root = parse("FunctionDef(body=[Assign(), *..., Return()], decorator_list={Name()})")
            .unwrap();
        let Ast::List(list) = &root.filters[0].1 else {
            panic!("expected list");
        };
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.items[1], Ast::Expand);
        assert!(matches!(root.filters[1].1, Ast::Set(_)));
    }

    #[test]
    fn parses_refs_and_logic() {
        let root = parse("Call(func=~f | Name(), args=[~f])");
        let root = root.unwrap();
        let Ast::LogicalOperation(op) = &root.filters[0].1 else {
            panic!("expected logical operation");
        };
        assert_eq!(op.operator, LogicOp::Or);
        assert!(matches!(op.left, Ast::Ref(_)));
    }

    #[test]
    fn match_strings_must_be_literal() {
        assert!(parse("Name(f'foo%')").is_ok());
        let error = parse("Name(f'{x}')").unwrap_err();
        assert!(error.to_string().contains("interpolation"));
        let error = parse("Name(f'')").unwrap_err();
        assert!(error.to_string().contains("empty match strings"));
    }

    #[test]
    fn syntax_errors_carry_positions() {
        let error = parse("Name(").unwrap_err();
        let QueryError::Syntax { span, .. } = error else {
            panic!("expected syntax error");
        };
        assert!(span.is_some());
    }

    #[test]
    fn none_and_ellipsis_fold_to_markers() {
        let root = parse("Return(value=None)").unwrap();
        assert_eq!(root.filters[0].1, Ast::Cease);
        let root = parse("Return(value=...)").unwrap();
        assert_eq!(root.filters[0].1, Ast::Ignore);
    }
}
