//! Compiler state: the match/field frame tower used for path
//! construction, the shared flag set, and the reference scope.

use std::collections::HashMap;

use crate::ir::Ir;
use crate::query::QueryError;
use crate::schema::{FieldInfo, Schema};
use crate::tree::Span;

/// Where the current filter hangs off its matcher: a named field, or a
/// synthesized expression (a subscript into a bound sequence).
#[derive(Debug, Clone)]
pub enum Pointer {
    Field(String),
    Expr(Ir),
}

/// Flags shared across the whole compilation, snapshotted into frozen
/// states when a reference definition is captured.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flags {
    pub in_for_loop: bool,
    pub enumeration_start: Option<usize>,
}

/// One matcher frame. Child frames clone their ancestors, so a frame
/// captured for a reference stays valid after the compiler moves on.
#[derive(Debug, Clone)]
pub struct State {
    pub match_name: String,
    pub depth: usize,
    pointers: Vec<Pointer>,
    pub parents: Vec<State>,
    frozen: Option<Flags>,
}

impl State {
    pub fn root(match_name: impl Into<String>) -> State {
        State {
            match_name: match_name.into(),
            depth: 0,
            pointers: Vec::new(),
            parents: Vec::new(),
            frozen: None,
        }
    }

    pub fn child(match_name: impl Into<String>, parent: &State) -> State {
        let mut parents = parent.parents.clone();
        parents.push(parent.clone());
        State {
            match_name: match_name.into(),
            depth: parent.depth + 1,
            pointers: Vec::new(),
            parents,
            frozen: None,
        }
    }

    pub fn push_pointer(&mut self, pointer: Pointer) {
        self.pointers.push(pointer);
    }

    pub fn pop_pointer(&mut self) {
        self.pointers.pop();
    }

    pub fn pointer(&self) -> Option<&Pointer> {
        self.pointers.last()
    }

    /// The declared field this frame filters on: the first pointer.
    pub fn field_name(&self) -> Option<&str> {
        match self.pointers.first() {
            Some(Pointer::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Kind and qualifier of the filtered field, from the field DB.
    pub fn field_info<'a>(
        &self,
        schema: &'a Schema,
        span: Option<Span>,
    ) -> Result<&'a FieldInfo, QueryError> {
        let field = self.field_name().ok_or_else(|| {
            QueryError::compiler("compiler check failed: no field in scope", span)
        })?;
        schema.field_db().lookup(&self.match_name, field).ok_or_else(|| {
            QueryError::compiler(
                format!("'{}' has no field '{field}'", self.match_name),
                span,
            )
        })
    }

    /// Freeze the live flags into a capture for later reference use.
    pub fn snapshot(&self, flags: Flags) -> State {
        let mut frozen = self.clone();
        frozen.frozen = Some(flags);
        frozen
    }

    /// Build the path expression from the topmost relevant frame down
    /// to this one, wrapping polymorphic hops in type assertions.
    pub fn compute_path(&self, live: Flags, schema: &Schema) -> Result<Ir, QueryError> {
        self.compute_path_inner(live, schema, false)
    }

    /// Like [`Self::compute_path`] but retrieves subscripted slots via
    /// `array_get`, so missing optional elements yield empty sets
    /// instead of errors.
    pub fn compute_path_optional(&self, live: Flags, schema: &Schema) -> Result<Ir, QueryError> {
        self.compute_path_inner(live, schema, true)
    }

    fn compute_path_inner(
        &self,
        live: Flags,
        schema: &Schema,
        allow_missing: bool,
    ) -> Result<Ir, QueryError> {
        let flags = self.frozen.unwrap_or(live);

        let mut chain: Vec<&State> = self.parents.iter().collect();
        chain.push(self);
        if let Some(start) = flags.enumeration_start {
            let position = chain
                .iter()
                .position(|state| state.depth == start)
                .ok_or_else(|| {
                    QueryError::compiler(
                        "compiler check failed: no enumeration start block found",
                        None,
                    )
                })?;
            chain.drain(..position);
        }

        let (first, rest) = chain
            .split_first()
            .expect("path chain always contains the current frame");

        let mut base = match first.pointer() {
            Some(Pointer::Field(field)) => {
                let wrapped = schema.wrap(field);
                if flags.in_for_loop {
                    Ir::name(wrapped)
                } else {
                    Ir::RootAttribute(wrapped)
                }
            }
            Some(Pointer::Expr(expr)) => maybe_optional(expr.clone(), allow_missing),
            None => {
                return Err(QueryError::compiler(
                    "compiler check failed: empty pointer stack",
                    None,
                ))
            }
        };

        for frame in rest {
            base = Ir::typed(base, schema.qualified(&frame.match_name));
            match frame.pointer() {
                Some(Pointer::Field(field)) => {
                    base = Ir::attribute(Some(base), schema.wrap(field));
                }
                Some(Pointer::Expr(_)) | None => {
                    return Err(QueryError::compiler(
                        "compiler check failed: non-field pointer mid-path",
                        None,
                    ))
                }
            }
        }

        Ok(base)
    }
}

fn maybe_optional(expr: Ir, allow_missing: bool) -> Ir {
    if !allow_missing {
        return expr;
    }
    match expr {
        Ir::Subscript { item, index } => Ir::call("array_get", vec![*item, *index]),
        other => other,
    }
}

/// Reference scope. Definitions share one table, as in a scope tower
/// whose frames all alias the same definition map: a name defined
/// anywhere is visible to every later occurrence, and every definition
/// must be used at least once by the time compilation finishes.
#[derive(Debug, Default)]
pub struct Scope {
    definitions: HashMap<String, State>,
    reference_counts: HashMap<String, usize>,
}

impl Scope {
    pub fn define(&mut self, name: &str, state: State) {
        self.definitions.insert(name.to_owned(), state);
        self.reference_counts.entry(name.to_owned()).or_insert(0);
    }

    pub fn lookup(&mut self, name: &str) -> Option<State> {
        let state = self.definitions.get(name)?.clone();
        *self.reference_counts.entry(name.to_owned()).or_insert(0) += 1;
        Some(state)
    }

    /// Every defined name must have been used at least once.
    pub fn verify(&self) -> Result<(), QueryError> {
        for (name, count) in &self.reference_counts {
            if *count < 1 {
                return Err(QueryError::compiler(
                    format!("unused reference: '{name}'"),
                    None,
                ));
            }
        }
        Ok(())
    }
}

/// Everything shared across one compilation.
pub struct Compiler<'a> {
    pub schema: &'a Schema,
    pub flags: Flags,
    pub scope: Scope,
    /// `WITH` bindings accumulated for the final namespace, in
    /// creation order
    pub variables: Vec<(String, Ir)>,
}

impl<'a> Compiler<'a> {
    pub fn new(schema: &'a Schema) -> Compiler<'a> {
        Compiler {
            schema,
            flags: Flags::default(),
            scope: Scope::default(),
            variables: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir;

    fn schema() -> Schema {
        Schema::bootstrap().unwrap()
    }

    #[test]
    fn paths_start_at_the_root_attribute() {
        let schema = schema();
        let mut state = State::root("Call");
        state.push_pointer(Pointer::Field("func".to_owned()));
        let path = state.compute_path(Flags::default(), &schema).unwrap();
        assert_eq!(ir::construct(&path), ".func");
    }

    #[test]
    fn nested_frames_add_type_assertions() {
        let schema = schema();
        let mut root = State::root("Call");
        root.push_pointer(Pointer::Field("func".to_owned()));
        let mut child = State::child("Attribute", &root);
        child.push_pointer(Pointer::Field("value".to_owned()));
        let path = child.compute_path(Flags::default(), &schema).unwrap();
        assert_eq!(ir::construct(&path), ".func[IS ast::Attribute].value");
    }

    #[test]
    fn renamed_fields_are_wrapped_in_paths() {
        let schema = schema();
        let mut state = State::root("Name");
        state.push_pointer(Pointer::Field("id".to_owned()));
        let path = state.compute_path(Flags::default(), &schema).unwrap();
        assert_eq!(ir::construct(&path), ".py_id");
    }

    #[test]
    fn optional_retrieval_goes_through_array_get() {
        let schema = schema();
        let mut state = State::root("Call");
        state.push_pointer(Pointer::Field("args".to_owned()));
        state.push_pointer(Pointer::Expr(Ir::subscript(
            Ir::name("sequence_f00f"),
            Ir::int(0),
        )));
        let flags = Flags {
            in_for_loop: true,
            enumeration_start: Some(0),
        };

        let hard = state.compute_path(flags, &schema).unwrap();
        assert_eq!(ir::construct(&hard), "sequence_f00f[0]");
        let soft = state.compute_path_optional(flags, &schema).unwrap();
        assert_eq!(ir::construct(&soft), "array_get(sequence_f00f, 0)");
    }

    #[test]
    fn frozen_flags_survive_later_list_scopes() {
        let schema = schema();
        let mut state = State::root("Call");
        state.push_pointer(Pointer::Field("func".to_owned()));
        let frozen = state.snapshot(Flags::default());

        let live = Flags {
            in_for_loop: true,
            enumeration_start: Some(0),
        };
        // the capture still renders from the selection root
        let path = frozen.compute_path(live, &schema).unwrap();
        assert_eq!(ir::construct(&path), ".func");
    }

    #[test]
    fn unused_definitions_fail_verification() {
        let mut scope = Scope::default();
        scope.define("f", State::root("Call"));
        assert!(scope.verify().is_err());
        scope.lookup("f");
        assert!(scope.verify().is_ok());
    }
}
