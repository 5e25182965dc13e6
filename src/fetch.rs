//! Query entry points: compile and run a structural query, and the
//! corpus statistics select.

use serde_json::Value;
use thiserror::Error;

use crate::backend::{BackendError, Connection};
use crate::ir::{self, Ir, Select, Selection};
use crate::query::{self, QueryError};
use crate::schema::{Schema, MODULE_LINK};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInfo {
    pub source_url: String,
    pub revision: Option<String>,
}

/// One match: the node's span plus enough context to locate the
/// source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub filename: String,
    pub lineno: i64,
    pub col_offset: i64,
    pub end_lineno: i64,
    pub end_col_offset: i64,
    pub project: ProjectInfo,
}

/// Compile a query to its final backend text: lowered, paginated,
/// shaped, optimized, printed.
pub fn prepare_query(
    source: &str,
    schema: &Schema,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<String, QueryError> {
    let compiled = query::compile_query(source, schema)?;
    let Ir::Select(mut select) = compiled else {
        return Err(QueryError::compiler(
            "query did not compile to a select",
            None,
        ));
    };
    select.limit = limit;
    select.offset = offset;
    select.selections = result_shape(schema);
    let optimized = ir::optimize(Ir::Select(select));
    Ok(ir::construct(&optimized))
}

fn result_shape(schema: &Schema) -> Vec<Selection> {
    vec![
        Selection::field("lineno"),
        Selection::field("col_offset"),
        Selection::field("end_lineno"),
        Selection::field("end_col_offset"),
        Selection::nested(
            MODULE_LINK,
            vec![
                Selection::field("filename"),
                Selection::nested(
                    "project",
                    vec![
                        Selection::field("git_source"),
                        Selection::field("git_revision"),
                    ],
                ),
            ],
        ),
    ]
}

/// Run a query and decode the result rows.
pub fn run_query(
    connection: &mut dyn Connection,
    schema: &Schema,
    source: &str,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Vec<QueryResult>, FetchError> {
    let statement = prepare_query(source, schema, limit, offset)?;
    tracing::info!(%statement, "running query");
    let rows = connection.query(&statement, None)?;
    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(result) = decode_row(&row) {
            results.push(result);
        }
    }
    Ok(results)
}

fn decode_row(row: &Value) -> Option<QueryResult> {
    let module = row.get(MODULE_LINK)?;
    let project = module.get("project")?;
    Some(QueryResult {
        filename: module.get("filename")?.as_str()?.to_owned(),
        lineno: row.get("lineno")?.as_i64()?,
        col_offset: row.get("col_offset")?.as_i64()?,
        end_lineno: row.get("end_lineno")?.as_i64()?,
        end_col_offset: row.get("end_col_offset")?.as_i64()?,
        project: ProjectInfo {
            source_url: project.get("git_source")?.as_str()?.to_owned(),
            revision: project
                .get("git_revision")
                .and_then(|value| value.as_str())
                .map(str::to_owned),
        },
    })
}

/// Corpus-wide node counts over the interesting bases.
pub fn stats(
    connection: &mut dyn Connection,
    schema: &Schema,
) -> Result<Vec<(String, i64)>, FetchError> {
    let bases = [schema.module_type(), "AST", "stmt", "expr"];
    let counts = Ir::merge(bases.iter().map(|base| {
        let name = if *base == "AST" {
            format!("{}::{}", crate::schema::NAMESPACE, base)
        } else {
            schema.qualified(base)
        };
        Ir::call("count", vec![Ir::name(name)])
    }))
    .expect("at least one base");

    let select = Ir::select(Select::new(counts));
    let rows = connection.query(&ir::construct(&select), None)?;
    Ok(bases
        .iter()
        .zip(rows)
        .map(|(base, row)| ((*base).to_owned(), row.as_i64().unwrap_or(0)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::Recorder;
    use serde_json::json;

    #[test]
    fn prepared_queries_carry_shape_and_pagination() {
        let schema = Schema::bootstrap().unwrap();
        let statement = prepare_query("Name()", &schema, Some(5), Some(10)).unwrap();
        assert!(statement.starts_with("SELECT ast::Name"));
        assert!(statement.contains("_module: {"));
        assert!(statement.contains("OFFSET 10"));
        assert!(statement.contains("LIMIT 5"));
    }

    #[test]
    fn rows_decode_into_results() {
        let schema = Schema::bootstrap().unwrap();
        let recorder = Recorder::new();
        recorder.push_response(vec![json!({
            "lineno": 3, "col_offset": 0, "end_lineno": 3, "end_col_offset": 7,
            "_module": {
                "filename": "demo/a.py",
                "project": {"git_source": "https://example.com/demo", "git_revision": null}
            }
        })]);
        let mut connection = recorder.connection();
        let results = run_query(&mut connection, &schema, "Name()", None, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].filename, "demo/a.py");
        assert_eq!(results[0].project.revision, None);
    }

    #[test]
    fn stats_counts_the_bases() {
        let schema = Schema::bootstrap().unwrap();
        let recorder = Recorder::new();
        recorder.push_response(vec![json!(2), json!(40), json!(10), json!(28)]);
        let mut connection = recorder.connection();
        let counts = stats(&mut connection, &schema).unwrap();
        assert_eq!(counts[0], ("Module".to_owned(), 2));
        assert_eq!(counts[3], ("expr".to_owned(), 28));

        let statement = &recorder.statements()[0];
        assert!(statement.query.contains("count(ast::PyModule)"));
        assert!(statement.query.contains("count(ast::AST)"));
    }
}
