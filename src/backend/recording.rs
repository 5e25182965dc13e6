//! A recording backend double: logs every statement, answers queued
//! canned rows first, then shape-appropriate defaults (inserts get a
//! fresh object id, everything else an empty set). Used by the test
//! suites and by `reiz-ingest --dry-run`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::{BackendError, Connection, Rows};

#[derive(Debug, Clone)]
pub struct Statement {
    pub query: String,
    pub variables: Option<Value>,
}

#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<Statement>>>,
    responses: Arc<Mutex<VecDeque<Rows>>>,
}

impl Recorder {
    pub fn new() -> Recorder {
        Recorder::default()
    }

    /// A connection view over this recorder; clones share the log.
    pub fn connection(&self) -> RecordingConnection {
        RecordingConnection {
            recorder: self.clone(),
        }
    }

    /// Queue rows to be returned by the next query.
    pub fn push_response(&self, rows: Rows) {
        self.responses.lock().push_back(rows);
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.log.lock().clone()
    }

    pub fn queries_matching(&self, needle: &str) -> Vec<Statement> {
        self.statements()
            .into_iter()
            .filter(|statement| statement.query.contains(needle))
            .collect()
    }
}

pub struct RecordingConnection {
    recorder: Recorder,
}

impl Connection for RecordingConnection {
    fn query(&mut self, query: &str, variables: Option<&Value>) -> Result<Rows, BackendError> {
        self.recorder.log.lock().push(Statement {
            query: query.to_owned(),
            variables: variables.cloned(),
        });

        if let Some(rows) = self.recorder.responses.lock().pop_front() {
            return Ok(rows);
        }
        if query.trim_start().starts_with("INSERT") {
            return Ok(vec![json!({ "id": Uuid::new_v4().to_string() })]);
        }
        if query.trim_start().starts_with("UPDATE") {
            return Ok(vec![json!({ "id": Uuid::new_v4().to_string() })]);
        }
        Ok(Vec::new())
    }
}
