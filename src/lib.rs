//! # Reiz
//!
//! Structural source-code search: source files are indexed as typed
//! syntax trees in a relational graph backend, and queried with a
//! pattern language whose surface syntax is the target language
//! itself.
//!
//! ## Pipeline
//!
//! ```text
//! Schema time:   ASDL grammar -> [grammar] -> [schema] -> migration SDL + field DB
//! Ingest time:   source file  -> [python]  -> [tree/transform] -> [serialize] -> backend
//! Query time:    query source -> [query::parser] -> [query::compiler] -> [ir::optimizer]
//!                             -> [ir::printer] -> backend -> locations
//! ```
//!
//! The grammar model is built once per process ([`schema::Schema::bootstrap`])
//! and passed by reference into every stage.

pub mod backend;
pub mod config;
pub mod dataset;
pub mod fetch;
pub mod grammar;
pub mod ingest;
pub mod ir;
pub mod python;
pub mod query;
pub mod schema;
pub mod serialize;
pub mod tree;

pub use config::Config;
pub use fetch::{run_query, QueryResult};
pub use ingest::{ingest, IngestOptions, Statistics};
pub use schema::Schema;

/// Install the tracing subscriber the binaries share. Honors
/// `REIZ_LOG` (falling back to `info`).
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("REIZ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
