//! # Serializer
//!
//! Walks an annotated tree and emits one `INSERT` per node, children
//! first, each nested object referenced back through a select-by-id.
//! Sequences of objects go through the enumerate/`FOR`-union form so
//! the `@index` link property lands in the same statement. After the
//! module row commits, one `UPDATE` per module-annotated base type
//! completes the `_module` back-edges from the reference pool.
//!
//! The whole file runs in a single transaction; failures roll back and
//! no partial file ever lands.

use std::collections::HashMap;

use serde_json::json;

use crate::backend::{transaction, BackendError, Connection};
use crate::dataset::SamplingData;
use crate::ir::{self, Comparator, Insert, Ir, Select, Selection, Update};
use crate::schema::{Schema, MODULE_LINK, PARENT_TYPES_PROPERTY, TAG_PROPERTY};
use crate::tree::{NodeId, Tree, Value};

/// Insert a fully annotated tree as one module. Returns the module's
/// object id.
pub fn insert_file(
    connection: &mut dyn Connection,
    schema: &Schema,
    tree: &Tree,
    filename: &str,
    project_id: &str,
) -> Result<String, BackendError> {
    transaction(connection, |connection| {
        let mut serializer = Serializer {
            connection: &mut *connection,
            schema,
            filename,
            project_id,
            reference_pool: HashMap::new(),
        };
        let module_id = serializer.insert_node(tree, tree.root())?;
        let pool = serializer.reference_pool;
        update_back_edges(connection, schema, &module_id, pool)
    })
}

/// Look the project record up by name, inserting it on first sight.
pub fn ensure_project(
    connection: &mut dyn Connection,
    schema: &Schema,
    project: &SamplingData,
) -> Result<String, BackendError> {
    let mut select = Select::new(Ir::name(schema.qualified(schema.project_type())));
    select.filters = Some(Ir::compare(
        Ir::RootAttribute("name".to_owned()),
        Comparator::Eq,
        Ir::string(project.name.clone()),
    ));
    select.limit = Some(1);
    let rows = connection.query(&ir::construct(&Ir::select(select)), None)?;
    if let Some(id) = rows.first().and_then(|row| row.get("id")).and_then(|id| id.as_str()) {
        return Ok(id.to_owned());
    }

    let mut body = vec![
        ("name".to_owned(), Ir::string(project.name.clone())),
        (
            "git_source".to_owned(),
            Ir::string(project.git_source.clone()),
        ),
    ];
    if let Some(revision) = &project.git_revision {
        body.push(("git_revision".to_owned(), Ir::string(revision.clone())));
    }
    let insert = Ir::Insert(Box::new(Insert {
        model: schema.qualified(schema.project_type()),
        body,
    }));
    let row = connection.query_single(&ir::construct(&insert), None)?;
    object_id(&row)
}

fn object_id(row: &serde_json::Value) -> Result<String, BackendError> {
    row.get("id")
        .and_then(|id| id.as_str())
        .map(str::to_owned)
        .ok_or_else(|| BackendError::Protocol("insert returned no object id".to_owned()))
}

struct Serializer<'a> {
    connection: &'a mut dyn Connection,
    schema: &'a Schema,
    filename: &'a str,
    project_id: &'a str,
    /// Inserted ids per module-annotated base, for the back-edge pass
    reference_pool: HashMap<String, Vec<String>>,
}

impl<'a> Serializer<'a> {
    fn insert_node(&mut self, tree: &Tree, id: NodeId) -> Result<String, BackendError> {
        let node = tree.get(id);
        let mut body: Vec<(String, Ir)> = Vec::new();

        for (field, value) in &node.fields {
            if let Some(expression) = self.serialize_value(tree, value)? {
                body.push((self.schema.wrap(field), expression));
            }
        }

        if id == tree.root() {
            body.push(("filename".to_owned(), Ir::string(self.filename)));
            body.push(("project".to_owned(), self.project_reference()));
        }

        if self.schema.model().has_position_attributes(&node.kind) {
            if let Some(span) = node.span {
                body.push(("lineno".to_owned(), Ir::int(span.lineno as i64)));
                body.push(("col_offset".to_owned(), Ir::int(span.col_offset as i64)));
                body.push(("end_lineno".to_owned(), Ir::int(span.end_lineno as i64)));
                body.push((
                    "end_col_offset".to_owned(),
                    Ir::int(span.end_col_offset as i64),
                ));
            }
        }

        if self.schema.model().is_annotated_node(&node.kind) {
            if let Some(tag) = node.tag {
                body.push((TAG_PROPERTY.to_owned(), Ir::int(tag as i64)));
            }
            if !node.parent_types.is_empty() {
                let pairs = node
                    .parent_types
                    .iter()
                    .map(|(type_id, field)| {
                        Ir::Tuple(vec![Ir::int(*type_id), Ir::string(field.clone())])
                    })
                    .collect();
                body.push((PARENT_TYPES_PROPERTY.to_owned(), Ir::Set(pairs)));
            }
        }

        let insert = Ir::Insert(Box::new(Insert {
            model: self.schema.qualified(&node.kind),
            body,
        }));
        let query = ir::construct(&insert);
        tracing::trace!(kind = %node.kind, "running insert");
        let row = self.connection.query_single(&query, None)?;
        let object = object_id(&row)?;

        if self.schema.model().is_annotated_node(&node.kind) {
            if let Some(base) = self.schema.model().base_of(&node.kind) {
                self.reference_pool
                    .entry(base.to_owned())
                    .or_default()
                    .push(object.clone());
            }
        }
        Ok(object)
    }

    fn serialize_value(
        &mut self,
        tree: &Tree,
        value: &Value,
    ) -> Result<Option<Ir>, BackendError> {
        match value {
            Value::None => Ok(None),
            Value::Int(value) => Ok(Some(Ir::int(*value))),
            Value::Str(value) => Ok(Some(Ir::string(value.clone()))),
            Value::Enum { base, member } => Ok(Some(Ir::enum_member(
                self.schema.qualified(base),
                member.clone(),
            ))),
            Value::Node(child) => {
                let select = self.insert_child(tree, *child)?;
                Ok(Some(select))
            }
            Value::List(items) if items.is_empty() => Ok(None),
            Value::List(items) => self.serialize_list(tree, items).map(Some),
        }
    }

    /// Insert a child and reference it through a select-by-id on its
    /// base type.
    fn insert_child(&mut self, tree: &Tree, child: NodeId) -> Result<Ir, BackendError> {
        let kind = tree.get(child).kind.clone();
        let object = self.insert_node(tree, child)?;
        let base = self
            .schema
            .model()
            .base_of(&kind)
            .unwrap_or(kind.as_str())
            .to_owned();
        Ok(select_by_id(self.schema, &base, &object))
    }

    fn serialize_list(&mut self, tree: &Tree, items: &[Value]) -> Result<Ir, BackendError> {
        let scalar_only = items
            .iter()
            .all(|item| !matches!(item, Value::Node(_) | Value::List(_)));
        if scalar_only {
            let mut rendered = Vec::with_capacity(items.len());
            for item in items {
                match self.serialize_value(tree, item)? {
                    Some(expression) => rendered.push(expression),
                    None => {
                        return Err(BackendError::Protocol(
                            "unannotated hole in a scalar sequence".to_owned(),
                        ))
                    }
                }
            }
            return Ok(Ir::Set(rendered));
        }

        let mut selects = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Node(child) => selects.push(self.insert_child(tree, *child)?),
                _ => {
                    return Err(BackendError::Protocol(
                        "unannotated hole in an object sequence".to_owned(),
                    ))
                }
            }
        }
        Ok(indexed_list(selects))
    }

    fn project_reference(&self) -> Ir {
        select_by_id(self.schema, self.schema.project_type(), self.project_id)
    }
}

/// `(SELECT <base> FILTER .id = <uuid>'...' LIMIT 1)`.
fn select_by_id(schema: &Schema, base: &str, id: &str) -> Ir {
    let mut select = Select::new(Ir::name(schema.qualified(base)));
    select.filters = Some(Ir::compare(
        Ir::RootAttribute("id".to_owned()),
        Comparator::Eq,
        Ir::cast("uuid", Ir::string(id)),
    ));
    select.limit = Some(1);
    Ir::select(select)
}

/// The enumerate/union form binding the element set and its `@index`
/// in one expression.
fn indexed_list(selects: Vec<Ir>) -> Ir {
    let select = {
        let mut select = Select::new(Ir::attribute(Some(Ir::name("__item")), "1"));
        select.selections = vec![Selection::Assign {
            target: Ir::Property("index".to_owned()),
            value: Ir::attribute(Some(Ir::name("__item")), "0"),
        }];
        select
    };
    Ir::Wrapped(Box::new(ir::Wrapped {
        namespace: ir::With {
            bindings: vec![("__items".to_owned(), Ir::Set(selects))],
        },
        statement: Ir::For(Box::new(ir::For {
            target: "__item".to_owned(),
            iterator: Ir::call("enumerate", vec![Ir::name("__items")]),
            body: Ir::select(select),
        })),
    }))
}

/// One `UPDATE` per module-annotated base: point every pooled node of
/// that base at its module. An update that matches no rows while its
/// pool is non-empty signals a lost reference.
fn update_back_edges(
    connection: &mut dyn Connection,
    schema: &Schema,
    module_id: &str,
    pool: HashMap<String, Vec<String>>,
) -> Result<String, BackendError> {
    let module_select = select_by_id(schema, schema.module_type(), module_id);

    for base in &schema.model().directives().module_annotated_types {
        let Some(ids) = pool.get(base) else { continue };
        if ids.is_empty() {
            continue;
        }

        let update = Ir::Update(Box::new(Update {
            model: schema.qualified(base),
            filters: Some(Ir::compare(
                Ir::RootAttribute("id".to_owned()),
                Comparator::In,
                Ir::call(
                    "array_unpack",
                    vec![Ir::cast("array<uuid>", Ir::Variable("ids".to_owned()))],
                ),
            )),
            body: vec![(MODULE_LINK.to_owned(), module_select.clone())],
        }));
        let variables = json!({ "ids": ids });
        let rows = connection.query(&ir::construct(&update), Some(&variables))?;
        if rows.is_empty() {
            return Err(BackendError::Constraint(format!(
                "back-edge update for '{base}' targeted zero rows"
            )));
        }
    }
    Ok(module_id.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::Recorder;
    use crate::tree::transform;

    fn ingest_source(source: &str) -> (Recorder, Schema) {
        let schema = Schema::bootstrap().unwrap();
        let mut tree = crate::python::parse_module(source, "<test>").unwrap();
        transform::annotate(&mut tree, &schema);
        let recorder = Recorder::new();
        let mut connection = recorder.connection();
        insert_file(&mut connection, &schema, &tree, "demo/a.py", "11111111-1111-1111-1111-111111111111").unwrap();
        (recorder, schema)
    }

    #[test]
    fn one_insert_per_node() {
        let (recorder, _) = ingest_source("x = 1\n");
        // Module, Assign, Name, Constant, plus the expr_context is inline
        let inserts = recorder.queries_matching("INSERT");
        assert_eq!(inserts.len(), 4);
    }

    #[test]
    fn module_insert_carries_filename_and_project() {
        let (recorder, _) = ingest_source("x = 1\n");
        let module = recorder.queries_matching("INSERT ast::PyModule");
        assert_eq!(module.len(), 1);
        assert!(module[0].query.contains("filename := 'demo/a.py'"));
        assert!(module[0].query.contains("SELECT ast::project"));
    }

    #[test]
    fn back_edges_updated_per_base() {
        let (recorder, _) = ingest_source("x = 1\n");
        let updates = recorder.queries_matching("UPDATE");
        // one statement base (Assign), one expr base (Name/Constant)
        assert_eq!(updates.len(), 2);
        for update in &updates {
            assert!(update.query.contains("_module :="));
            assert!(update.query.contains("array_unpack(<array<uuid>>$ids)"));
            assert!(update.variables.is_some());
        }
    }

    #[test]
    fn object_sequences_use_the_indexed_form() {
        let (recorder, _) = ingest_source("x = 1\n");
        let module = &recorder.queries_matching("INSERT ast::PyModule")[0];
        assert!(module.query.contains("enumerate(__items)"));
        assert!(module.query.contains("@index := __item.0"));
    }

    #[test]
    fn enum_values_serialize_as_cast_literals() {
        let (recorder, _) = ingest_source("x = 1\n");
        let name = &recorder.queries_matching("INSERT ast::Name")[0];
        assert!(name.query.contains("<ast::expr_context>'Store'"));
    }

    #[test]
    fn everything_runs_in_one_transaction() {
        let (recorder, _) = ingest_source("x = 1\n");
        let statements = recorder.statements();
        assert_eq!(statements.first().unwrap().query, "START TRANSACTION");
        assert_eq!(statements.last().unwrap().query, "COMMIT");
    }

    #[test]
    fn tags_and_parent_types_are_stored() {
        let (recorder, _) = ingest_source("x = 1\n");
        let name = &recorder.queries_matching("INSERT ast::Name")[0];
        assert!(name.query.contains("_tag := "));
        assert!(name.query.contains("_parent_types := "));
    }

    #[test]
    fn ensure_project_inserts_once() {
        let schema = Schema::bootstrap().unwrap();
        let recorder = Recorder::new();
        let mut connection = recorder.connection();
        let project = SamplingData {
            name: "demo".to_owned(),
            downloads: 1,
            git_source: "https://example.com/demo".to_owned(),
            git_revision: Some("abc".to_owned()),
            license_type: None,
        };
        let id = ensure_project(&mut connection, &schema, &project).unwrap();
        assert!(!id.is_empty());
        let statements = recorder.statements();
        assert!(statements[0].query.starts_with("SELECT ast::project"));
        assert!(statements[1].query.starts_with("INSERT ast::project"));
    }
}
