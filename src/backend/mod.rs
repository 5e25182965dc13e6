//! # Storage Backend
//!
//! The corpus targets an external typed graph database; this module
//! holds the thin client ([`http`]), the per-process connection pool
//! ([`pool`]), the ingest caches ([`cache`]) and a recording test
//! double ([`recording`]). Everything above talks to the backend
//! through the object-safe [`Connection`] trait.

use serde_json::Value;
use thiserror::Error;

pub mod cache;
pub mod http;
pub mod pool;
pub mod recording;

pub use cache::IngestCache;
pub use http::HttpConnection;
pub use pool::{ConnectionPool, PooledConnection};

/// Result rows, as JSON values.
pub type Rows = Vec<Value>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend rejected or failed a statement
    #[error("{kind}: {message}")]
    Query { kind: String, message: String },

    /// A uniqueness or reference guarantee was violated
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The backend answered with something we cannot interpret
    #[error("malformed backend response: {0}")]
    Protocol(String),
}

impl BackendError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, BackendError::Constraint(_))
    }
}

/// One live backend session. Implementations are handed out by the
/// pool and owned by a single worker at a time.
pub trait Connection: Send {
    /// Run a parameterized statement and return its rows.
    fn query(&mut self, query: &str, variables: Option<&Value>) -> Result<Rows, BackendError>;

    /// Run a statement expected to return exactly one row.
    fn query_single(
        &mut self,
        query: &str,
        variables: Option<&Value>,
    ) -> Result<Value, BackendError> {
        let mut rows = self.query(query, variables)?;
        if rows.len() != 1 {
            return Err(BackendError::Protocol(format!(
                "expected one row, got {}",
                rows.len()
            )));
        }
        Ok(rows.remove(0))
    }

    /// Run a statement for its side effect.
    fn execute(&mut self, query: &str) -> Result<(), BackendError> {
        self.query(query, None).map(|_| ())
    }
}

/// Run `body` inside one backend transaction. A failing body rolls the
/// transaction back and surfaces the original error; partial files
/// never land.
pub fn transaction<T>(
    connection: &mut dyn Connection,
    body: impl FnOnce(&mut dyn Connection) -> Result<T, BackendError>,
) -> Result<T, BackendError> {
    connection.execute("START TRANSACTION")?;
    match body(connection) {
        Ok(value) => {
            connection.execute("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = connection.execute("ROLLBACK") {
                tracing::warn!("rollback failed after {error}: {rollback}");
            }
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recording::Recorder;
    use super::*;

    #[test]
    fn transaction_commits_on_success() {
        let recorder = Recorder::new();
        let mut connection = recorder.connection();
        transaction(&mut connection, |conn| conn.execute("SELECT 1")).unwrap();
        let statements = recorder.statements();
        assert_eq!(statements[0].query, "START TRANSACTION");
        assert_eq!(statements[2].query, "COMMIT");
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let recorder = Recorder::new();
        let mut connection = recorder.connection();
        let result: Result<(), _> = transaction(&mut connection, |_| {
            Err(BackendError::Protocol("boom".to_owned()))
        });
        assert!(result.is_err());
        let statements = recorder.statements();
        assert_eq!(statements.last().unwrap().query, "ROLLBACK");
    }
}
