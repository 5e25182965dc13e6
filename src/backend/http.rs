//! Blocking client for the backend's HTTP query endpoint:
//! `POST {dsn}/db/{database}/edgeql` with a JSON body of
//! `{"query": ..., "variables": ...}`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::backend::{BackendError, Connection, Rows};
use crate::config::DatabaseConfig;

pub struct HttpConnection {
    client: reqwest::blocking::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    data: Option<Rows>,
    error: Option<QueryResponseError>,
}

#[derive(Deserialize)]
struct QueryResponseError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl HttpConnection {
    pub fn connect(config: &DatabaseConfig) -> Result<HttpConnection, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()?;
        let endpoint = format!(
            "{}/db/{}/edgeql",
            config.dsn.trim_end_matches('/'),
            config.database
        );
        Ok(HttpConnection { client, endpoint })
    }
}

impl Connection for HttpConnection {
    fn query(&mut self, query: &str, variables: Option<&Value>) -> Result<Rows, BackendError> {
        let body = json!({
            "query": query,
            "variables": variables.cloned().unwrap_or_else(|| json!({})),
        });
        tracing::trace!(%query, "running backend statement");

        let response: QueryResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()?
            .json()?;

        if let Some(error) = response.error {
            let kind = error.kind.unwrap_or_else(|| "BackendError".to_owned());
            if kind.contains("ConstraintViolation") {
                return Err(BackendError::Constraint(error.message));
            }
            return Err(BackendError::Query {
                kind,
                message: error.message,
            });
        }
        response
            .data
            .ok_or_else(|| BackendError::Protocol("response carried neither data nor error".to_owned()))
    }
}
