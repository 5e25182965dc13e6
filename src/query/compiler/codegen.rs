//! Grammar-to-IR lowering rules, one per grammar node.

use crate::grammar::FieldKind;
use crate::ir::{self, Comparator, Ir, Select};
use crate::python::repr::str_repr;
use crate::query::compiler::functions;
use crate::query::compiler::state::{Compiler, Pointer, State};
use crate::query::grammar::{Ast, ConstantValue, List, LogicOp, Match, SetMatch};
use crate::query::QueryError;
use crate::schema::{Schema, TAG_PROPERTY};

/// Compile a parsed query into its root `SELECT`.
pub fn compile(root: &Match, schema: &Schema) -> Result<Ir, QueryError> {
    let mut compiler = Compiler::new(schema);
    let mut state = State::root(&root.name);
    let mut filters = compile_filters(root, &mut state, &mut compiler)?;
    compiler.scope.verify()?;

    // the namespace is nested inside FILTER so that leading-dot paths
    // in the bindings keep resolving against the selected object
    if !compiler.variables.is_empty() {
        let inner = Ir::select(Select::new(filters.unwrap_or(Ir::name("true"))));
        filters = Some(Ir::Wrapped(Box::new(ir::Wrapped {
            namespace: ir::With {
                bindings: compiler.variables.drain(..).collect(),
            },
            statement: inner,
        })));
    }

    let mut select = Select::new(Ir::name(schema.qualified(&root.name)));
    select.filters = filters;
    Ok(Ir::select(select))
}

/// Compile the filters of one matcher; the `state` is the matcher's
/// own frame.
fn compile_filters(
    node: &Match,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let mut filters: Option<Ir> = None;
    for (field, value) in &node.filters {
        if matches!(value, Ast::Ignore) {
            continue;
        }
        state.push_pointer(Pointer::Field(field.clone()));
        let compiled = codegen(value, state, compiler);
        state.pop_pointer();
        if let Some(filter) = compiled? {
            filters = Some(Ir::combine(filters, filter));
        }
    }
    Ok(filters)
}

/// Lower one grammar node against the current frame. `Ok(None)` means
/// the node produced no filter (a reference definition).
pub fn codegen(
    node: &Ast,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    match node {
        Ast::Match(matcher) => compile_matcher(matcher, state, compiler),
        Ast::MatchEnum(member) => {
            let path = state.compute_path(compiler.flags, compiler.schema)?;
            let value = Ir::enum_member(
                compiler.schema.qualified(&member.base),
                member.member.clone(),
            );
            Ok(Some(Ir::compare(path, Comparator::Eq, value)))
        }
        Ast::Constant(constant) => {
            let path = state.compute_path(compiler.flags, compiler.schema)?;
            let literal = constant_literal(&constant.value, &state.match_name);
            Ok(Some(Ir::compare(path, Comparator::Eq, literal)))
        }
        Ast::MatchString(pattern) => {
            let path = state.compute_path(compiler.flags, compiler.schema)?;
            Ok(Some(Ir::compare(
                path,
                Comparator::Like,
                Ir::string(pattern.pattern.clone()),
            )))
        }
        Ast::Not(inner) => {
            let compiled = codegen(inner, state, compiler)?.ok_or_else(|| {
                QueryError::compiler("cannot negate a reference definition", inner.span())
            })?;
            Ok(Some(Ir::negate(compiled)))
        }
        Ast::LogicalOperation(operation) => {
            let left = codegen(&operation.left, state, compiler)?.ok_or_else(|| {
                QueryError::compiler(
                    "a reference definition cannot be a logical operand",
                    operation.left.span(),
                )
            })?;
            let right = codegen(&operation.right, state, compiler)?.ok_or_else(|| {
                QueryError::compiler(
                    "a reference definition cannot be a logical operand",
                    operation.right.span(),
                )
            })?;
            let symbol = match operation.operator {
                LogicOp::Or => "OR",
                LogicOp::And => "AND",
            };
            let operator = Comparator::from_symbol(symbol)
                .map_err(|error| QueryError::compiler(error.to_string(), node.span()))?;
            Ok(Some(Ir::compare(left, operator, right)))
        }
        Ast::Ref(reference) => compile_reference(reference, state, compiler),
        Ast::List(list) => compile_sequence(list, state, compiler),
        Ast::Set(set) => compile_set(set, state, compiler),
        Ast::Builtin(builtin) => functions::compile_builtin(builtin, state, compiler),
        Ast::Cease => {
            let path = state.compute_path(compiler.flags, compiler.schema)?;
            Ok(Some(Ir::negate(Ir::exists(path))))
        }
        Ast::Ignore => Ok(None),
        Ast::Expand => Err(QueryError::compiler(
            "'*...' is only allowed inside a list match",
            None,
        )),
    }
}

fn compile_matcher(
    node: &Match,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let mut child = State::child(&node.name, state);
    let filters = compile_filters(node, &mut child, compiler)?;

    match filters {
        Some(filters) => Ok(Some(filters)),
        // a bare matcher asserts the field's runtime type
        None => {
            let path = state.compute_path(compiler.flags, compiler.schema)?;
            Ok(Some(Ir::compare(
                path,
                Comparator::Is,
                qualified_type(compiler.schema, &node.name),
            )))
        }
    }
}

/// Namespaced form of a type name; the optimizer's type-union rewrite
/// keys on this shape.
fn qualified_type(schema: &Schema, name: &str) -> Ir {
    Ir::NamespaceAttribute {
        namespace: crate::schema::NAMESPACE.to_owned(),
        attr: schema.wrap(name),
    }
}

/// Constants are stored as their `repr` text, so a constant matched
/// inside a `Constant` node is re-rendered the same way.
fn constant_literal(value: &ConstantValue, match_name: &str) -> Ir {
    if match_name == "Constant" {
        let repr = match value {
            ConstantValue::Str(value) => str_repr(value),
            ConstantValue::Int(value) => value.to_string(),
            ConstantValue::Bool(true) => "True".to_owned(),
            ConstantValue::Bool(false) => "False".to_owned(),
            ConstantValue::Float(value) => format!("{value}"),
        };
        return Ir::string(repr);
    }
    match value {
        ConstantValue::Str(value) => Ir::string(value.clone()),
        ConstantValue::Int(value) => Ir::int(*value),
        ConstantValue::Bool(value) => Ir::int(*value as i64),
        ConstantValue::Float(value) => Ir::string(format!("{value}")),
    }
}

fn compile_reference(
    reference: &crate::query::grammar::Ref,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let span = Some(reference.span);
    let obtained = state.field_info(compiler.schema, span)?.kind.clone();

    if let Some(definition) = compiler.scope.lookup(&reference.name) {
        let expected = definition.field_info(compiler.schema, span)?.kind.clone();
        if expected != obtained {
            return Err(QueryError::compiler(
                format!(
                    "reference '{}' is used where a different grammar type is expected",
                    reference.name
                ),
                span,
            ));
        }

        let mut left = state.compute_path(compiler.flags, compiler.schema)?;
        let mut right = definition.compute_path(compiler.flags, compiler.schema)?;
        // tagged nodes compare structurally, not by object identity
        if is_tagged_kind(compiler.schema, &obtained) {
            left = Ir::attribute(Some(left), TAG_PROPERTY);
            right = Ir::attribute(Some(right), TAG_PROPERTY);
        }
        return Ok(Some(Ir::compare(left, Comparator::Eq, right)));
    }

    if !is_capturable_kind(compiler.schema, &obtained) {
        return Err(QueryError::compiler(
            format!("'{}' cannot capture a '{obtained}' field", reference.name),
            span,
        ));
    }
    let snapshot = state.snapshot(compiler.flags);
    compiler.scope.define(&reference.name, snapshot);
    Ok(None)
}

/// Types carrying a structural tag (members of module-annotated bases).
fn is_tagged_kind(schema: &Schema, kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Named(name) => {
            schema.model().is_module_annotated(name) || schema.model().is_annotated_node(name)
        }
        _ => false,
    }
}

fn is_capturable_kind(schema: &Schema, kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Int | FieldKind::String | FieldKind::Identifier | FieldKind::Constant => true,
        FieldKind::Named(_) => is_tagged_kind(schema, kind),
    }
}

fn compile_sequence(
    list: &List,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let total = list.items.len();
    let path = state.compute_path(compiler.flags, compiler.schema)?;
    let mut length_verifier = Ir::compare(
        Ir::call("count", vec![path.clone()]),
        Comparator::Eq,
        Ir::int(total as i64),
    );

    if total == 0
        || list
            .items
            .iter()
            .all(|item| matches!(item, Ast::Ignore | Ast::Expand))
    {
        return Ok(Some(length_verifier));
    }

    let expansions = list
        .items
        .iter()
        .filter(|item| matches!(item, Ast::Expand))
        .count();
    if expansions > 1 {
        return Err(QueryError::compiler(
            "only one '*...' is allowed per list match",
            Some(list.span),
        ));
    }
    if expansions == 1 {
        length_verifier = Ir::compare(
            Ir::call("count", vec![path]),
            Comparator::Gte,
            Ir::int(total as i64 - 1),
        );
    }

    let array_ref = ir::new_reference("sequence");
    let aggregate = aggregate_array(state, compiler)?;
    compiler.variables.push((array_ref.clone(), aggregate));

    let saved_flags = compiler.flags;
    compiler.flags.in_for_loop = true;
    compiler.flags.enumeration_start = Some(state.depth);

    let mut filters: Option<Ir> = None;
    let mut expansion_seen = false;
    let mut result = Ok(());
    for (position, item) in list.items.iter().enumerate() {
        match item {
            Ast::Ignore => continue,
            Ast::Expand => {
                expansion_seen = true;
                continue;
            }
            Ast::Match(_) | Ast::Ref(_) => {}
            other => {
                result = Err(QueryError::compiler(
                    "list matches may only contain matchers, references, '...' and '*...'",
                    other.span().or(Some(list.span)),
                ));
                break;
            }
        }

        // past the expansion point, anchor to the tail
        let index = if expansion_seen {
            position as i64 - total as i64
        } else {
            position as i64
        };
        state.push_pointer(Pointer::Expr(Ir::subscript(
            Ir::name(array_ref.clone()),
            Ir::int(index),
        )));
        let compiled = codegen(item, state, compiler);
        state.pop_pointer();
        match compiled {
            Ok(Some(filter)) => filters = Some(Ir::combine(filters, filter)),
            Ok(None) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    compiler.flags = saved_flags;
    result?;

    // every item may have been a reference definition
    let Some(filters) = filters else {
        return Ok(Some(length_verifier));
    };
    Ok(Some(Ir::combine(Some(length_verifier), filters)))
}

/// Bind the ordered field sequence to an array variable. Inside an
/// outer list loop the aggregation runs through a `FOR` over the
/// parent path, so `@index` stays unambiguous.
fn aggregate_array(state: &State, compiler: &Compiler) -> Result<Ir, QueryError> {
    const TARGET: &str = "_singleton";
    let body = if compiler.flags.in_for_loop {
        let field = match state.pointer() {
            Some(Pointer::Field(field)) => compiler.schema.wrap(field),
            _ => {
                return Err(QueryError::compiler(
                    "compiler check failed: list match without a field pointer",
                    None,
                ))
            }
        };
        let element = Ir::attribute(
            Some(Ir::typed(
                Ir::name(TARGET),
                compiler.schema.qualified(&state.match_name),
            )),
            field,
        );
        let parent = state.parents.last().ok_or_else(|| {
            QueryError::compiler("compiler check failed: nested list without a parent", None)
        })?;
        let mut select = Select::new(element);
        select.order = Some(Ir::Property("index".to_owned()));
        Ir::For(Box::new(ir::For {
            target: TARGET.to_owned(),
            iterator: parent.compute_path(compiler.flags, compiler.schema)?,
            body: Ir::select(select),
        }))
    } else {
        let mut select = Select::new(state.compute_path(compiler.flags, compiler.schema)?);
        select.order = Some(Ir::Property("index".to_owned()));
        Ir::select(select)
    };
    Ok(Ir::call("array_agg", vec![body]))
}

/// Set matches compile each item against the plain field path; the
/// backend's set semantics make the filter true when any element of
/// the sequence satisfies it.
fn compile_set(
    set: &SetMatch,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let mut filters: Option<Ir> = None;
    for item in &set.items {
        let compiled = codegen(item, state, compiler)?.ok_or_else(|| {
            QueryError::compiler(
                "a reference definition cannot be a set item",
                item.span().or(Some(set.span)),
            )
        })?;
        filters = Some(Ir::combine(filters, compiled));
    }
    filters
        .ok_or_else(|| QueryError::compiler("empty set matches are not allowed", Some(set.span)))
        .map(Some)
}
