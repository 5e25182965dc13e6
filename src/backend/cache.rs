//! In-memory ingest caches: the module filenames and project names
//! already present in the backend. Hydrated once at startup from two
//! prepared selects, mutated on successful inserts, and shared across
//! every ingest worker. They are the authoritative dedup for the
//! driver; the exclusive constraints behind them are the safety net.

use dashmap::DashSet;

use crate::backend::{BackendError, Connection};
use crate::ir::{self, Select, Selection};
use crate::schema::Schema;

/// The `SELECT Module { filename }` prepared query.
pub fn module_filenames(schema: &Schema) -> ir::Ir {
    let mut select = Select::new(ir::Ir::name(schema.qualified(schema.module_type())));
    select.selections = vec![Selection::field("filename")];
    ir::Ir::select(select)
}

/// The `SELECT project { name }` prepared query.
pub fn project_names(schema: &Schema) -> ir::Ir {
    let mut select = Select::new(ir::Ir::name(schema.qualified(schema.project_type())));
    select.selections = vec![Selection::field("name")];
    ir::Ir::select(select)
}

#[derive(Default)]
pub struct IngestCache {
    files: DashSet<String>,
    projects: DashSet<String>,
}

impl IngestCache {
    pub fn new() -> IngestCache {
        IngestCache::default()
    }

    /// Read both caches from the backend.
    pub fn sync(
        connection: &mut dyn Connection,
        schema: &Schema,
    ) -> Result<IngestCache, BackendError> {
        let cache = IngestCache::new();

        let rows = connection.query(&ir::construct(&module_filenames(schema)), None)?;
        for row in rows {
            if let Some(filename) = row.get("filename").and_then(|value| value.as_str()) {
                cache.files.insert(filename.to_owned());
            }
        }

        let rows = connection.query(&ir::construct(&project_names(schema)), None)?;
        for row in rows {
            if let Some(name) = row.get("name").and_then(|value| value.as_str()) {
                cache.projects.insert(name.to_owned());
            }
        }
        Ok(cache)
    }

    pub fn has_file(&self, filename: &str) -> bool {
        self.files.contains(filename)
    }

    pub fn add_file(&self, filename: &str) {
        self.files.insert(filename.to_owned());
    }

    pub fn has_project(&self, name: &str) -> bool {
        self.projects.contains(name)
    }

    pub fn add_project(&self, name: &str) {
        self.projects.insert(name.to_owned());
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::Recorder;
    use serde_json::json;

    #[test]
    fn prepared_queries_select_the_key_fields() {
        let schema = Schema::bootstrap().unwrap();
        let query = ir::construct(&module_filenames(&schema));
        assert!(query.starts_with("SELECT ast::PyModule"));
        assert!(query.contains("filename"));

        let query = ir::construct(&project_names(&schema));
        assert!(query.starts_with("SELECT ast::project"));
    }

    #[test]
    fn sync_hydrates_both_sets() {
        let schema = Schema::bootstrap().unwrap();
        let recorder = Recorder::new();
        recorder.push_response(vec![json!({"filename": "demo/a.py"})]);
        recorder.push_response(vec![json!({"name": "demo"})]);

        let mut connection = recorder.connection();
        let cache = IngestCache::sync(&mut connection, &schema).unwrap();
        assert!(cache.has_file("demo/a.py"));
        assert!(!cache.has_file("demo/b.py"));
        assert!(cache.has_project("demo"));
    }
}
