//! Builtin matcher functions: `ALL`, `ANY`, `LEN`, `I`, `META`.
//!
//! Each builtin declares its parameter list; arguments are bound
//! positionally, then by keyword, then from defaults, with arity
//! violations reported against the call site.

use std::collections::HashMap;

use crate::ir::{Comparator, Ir};
use crate::query::compiler::codegen;
use crate::query::compiler::state::{Compiler, Pointer, State};
use crate::query::grammar::{Ast, Builtin, ConstantValue};
use crate::query::QueryError;
use crate::schema::PARENT_TYPES_PROPERTY;

/// Keyword slot `META` must be bound to.
const METADATA_FIELD: &str = "__metadata__";

struct Signature {
    params: &'static [&'static str],
    /// Parameters that may stay unbound
    optional: &'static [&'static str],
}

impl Signature {
    fn bind<'n>(
        &self,
        node: &'n Builtin,
    ) -> Result<HashMap<&'static str, &'n Ast>, QueryError> {
        let mut bound: HashMap<&'static str, &'n Ast> = HashMap::new();
        let span = Some(node.span);

        for (position, arg) in node.args.iter().enumerate() {
            let Some(param) = self.params.get(position).copied() else {
                return Err(QueryError::compiler(
                    format!("too many arguments for '{}'", node.name),
                    span,
                ));
            };
            bound.insert(param, arg);
        }

        for (keyword, value) in &node.keywords {
            let Some(param) = self
                .params
                .iter()
                .copied()
                .find(|param| *param == keyword.as_str())
            else {
                return Err(QueryError::compiler(
                    format!("'{}' has no parameter '{keyword}'", node.name),
                    span,
                ));
            };
            if bound.contains_key(param) {
                return Err(QueryError::compiler(
                    format!("parameter '{keyword}' bound twice in '{}'", node.name),
                    span,
                ));
            }
            bound.insert(param, value);
        }

        for param in self.params.iter().copied() {
            if !bound.contains_key(param) && !self.optional.contains(&param) {
                return Err(QueryError::compiler(
                    format!("'{}' is missing the '{param}' argument", node.name),
                    span,
                ));
            }
        }
        Ok(bound)
    }
}

pub fn compile_builtin(
    node: &Builtin,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    match node.name.as_str() {
        "I" => compile_insensitive(node, state, compiler),
        "ALL" | "ANY" => compile_quantifier(node, state, compiler),
        "LEN" => compile_length(node, state, compiler),
        "META" => compile_metadata(node, state, compiler),
        other => Err(QueryError::compiler(
            format!("unknown builtin: '{other}'"),
            Some(node.span),
        )),
    }
}

/// `I(f"...")`: the case-insensitive match string.
fn compile_insensitive(
    node: &Builtin,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let signature = Signature {
        params: &["match_str"],
        optional: &[],
    };
    let bound = signature.bind(node)?;
    let Ast::MatchString(pattern) = bound["match_str"] else {
        return Err(QueryError::compiler(
            "'I' takes a match string",
            Some(node.span),
        ));
    };
    let path = state.compute_path(compiler.flags, compiler.schema)?;
    Ok(Some(Ir::compare(
        path,
        Comparator::ILike,
        Ir::string(pattern.pattern.clone()),
    )))
}

/// `ALL(x)` / `ANY(x)`: quantify the inner predicate over the set.
fn compile_quantifier(
    node: &Builtin,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let signature = Signature {
        params: &["value"],
        optional: &[],
    };
    let bound = signature.bind(node)?;
    let inner = codegen(bound["value"], state, compiler)?.ok_or_else(|| {
        QueryError::compiler(
            format!("'{}' cannot quantify a reference definition", node.name),
            Some(node.span),
        )
    })?;
    Ok(Some(Ir::call(node.name.to_lowercase(), vec![inner])))
}

/// `LEN(min=, max=)`: bound the sequence length.
fn compile_length(
    node: &Builtin,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let signature = Signature {
        params: &["min", "max"],
        optional: &["min", "max"],
    };
    let bound = signature.bind(node)?;
    if bound.is_empty() {
        return Err(QueryError::compiler(
            "'LEN' needs at least one of 'min' and 'max'",
            Some(node.span),
        ));
    }

    let count = Ir::call(
        "count",
        vec![state.compute_path(compiler.flags, compiler.schema)?],
    );
    let mut filters: Option<Ir> = None;
    for (param, operator) in [("min", Comparator::Gte), ("max", Comparator::Lte)] {
        let Some(value) = bound.get(param) else {
            continue;
        };
        let Ast::Constant(constant) = value else {
            return Err(QueryError::compiler(
                format!("'LEN' bounds must be integers, got {value:?}"),
                Some(node.span),
            ));
        };
        let ConstantValue::Int(bound_value) = &constant.value else {
            return Err(QueryError::compiler(
                "'LEN' bounds must be integers",
                Some(constant.span),
            ));
        };
        filters = Some(Ir::combine(
            filters,
            Ir::compare(count.clone(), operator, Ir::int(*bound_value)),
        ));
    }
    Ok(filters)
}

/// `META(parent=M)`: membership test against `_parent_types`. The
/// parent matcher must constrain exactly one field, with the ignore
/// marker, naming the edge the parent reaches this node through.
fn compile_metadata(
    node: &Builtin,
    state: &mut State,
    compiler: &mut Compiler,
) -> Result<Option<Ir>, QueryError> {
    let span = Some(node.span);
    if !matches!(state.pointer(), Some(Pointer::Field(field)) if field == METADATA_FIELD) {
        return Err(QueryError::compiler(
            format!("'META' must be bound to the '{METADATA_FIELD}' keyword"),
            span,
        ));
    }

    let signature = Signature {
        params: &["parent"],
        optional: &["parent"],
    };
    let bound = signature.bind(node)?;

    let mut filters: Option<Ir> = None;
    if let Some(parent) = bound.get("parent") {
        let Ast::Match(parent) = parent else {
            return Err(QueryError::compiler("'parent' takes a matcher", span));
        };
        if parent.filters.len() != 1 {
            return Err(QueryError::compiler(
                "the parent matcher must constrain exactly one field",
                Some(parent.span),
            ));
        }
        let (field, marker) = &parent.filters[0];
        if !matches!(marker, Ast::Ignore) {
            return Err(QueryError::compiler(
                "the parent matcher's field must be '...'",
                Some(parent.span),
            ));
        }
        let type_id = compiler.schema.model().type_id(&parent.name).ok_or_else(|| {
            QueryError::compiler(
                format!("unknown matcher: '{}'", parent.name),
                Some(parent.span),
            )
        })?;

        state.push_pointer(Pointer::Field(PARENT_TYPES_PROPERTY.to_owned()));
        let path = state.compute_path(compiler.flags, compiler.schema);
        state.pop_pointer();

        filters = Some(Ir::combine(
            filters,
            Ir::compare(
                Ir::Tuple(vec![Ir::int(type_id), Ir::string(field.clone())]),
                Comparator::In,
                path?,
            ),
        ));
    }
    Ok(filters)
}
