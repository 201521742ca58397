//! RDS Data API backend.
//!
//! Speaks the `ExecuteStatement` JSON protocol over plain HTTP. Request
//! signing is not performed here; point the executor at a Data API
//! compatible gateway (for example `local-data-api`) or a signing proxy.

use crate::backend::StatementExecutor;
use crate::error::{Error, Result};
use crate::types::{Cell, Handles, Parameter, Row, Statement, StatementResult};
use serde::{Deserialize, Serialize};

/// Data API backend over HTTP.
///
/// # Example
///
/// ```no_run
/// use dataapi::{Handles, HttpExecutor, Statement, StatementExecutor};
///
/// let executor = HttpExecutor::new("http://localhost:8080");
/// let handles = Handles::new("arn:cluster", "arn:secret");
/// executor
///     .execute(&handles, &Statement::new("CREATE DATABASE app OWNER postgres"))
///     .unwrap();
/// ```
pub struct HttpExecutor {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Endpoint base URL.
    endpoint: String,
}

impl HttpExecutor {
    /// Create an executor for the given endpoint base URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        // Data API reports rejected statements as 4xx with a JSON body; we
        // want that body rather than a bare status code.
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the endpoint base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn execute_url(&self) -> String {
        format!("{}/Execute", self.endpoint)
    }
}

impl StatementExecutor for HttpExecutor {
    fn execute(&self, handles: &Handles, statement: &Statement) -> Result<StatementResult> {
        let request = ExecuteStatementRequest::new(handles, statement);

        log::trace!("POST {} ({})", self.execute_url(), statement);

        let mut response = self
            .agent
            .post(&self.execute_url())
            .header("User-Agent", "pgconverge")
            .send_json(&request)?;

        let status = response.status();
        let body = response.body_mut().read_to_string()?;

        if status.is_success() {
            let decoded: ExecuteStatementResponse = serde_json::from_str(&body)?;
            return Ok(decoded.into());
        }

        let message = error_message(&body);
        if status.is_client_error() {
            Err(Error::rejected(message))
        } else {
            Err(Error::http(message, Some(status.as_u16())))
        }
    }
}

/// Pull the human message out of a Data API error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

// =============================================================================
// Data API wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteStatementRequest<'a> {
    resource_arn: &'a str,
    secret_arn: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    sql: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<SqlParameter<'a>>,
    include_result_metadata: bool,
}

impl<'a> ExecuteStatementRequest<'a> {
    fn new(handles: &'a Handles, statement: &'a Statement) -> Self {
        Self {
            resource_arn: &handles.resource_arn,
            secret_arn: &handles.secret_arn,
            database: handles.database.as_deref(),
            sql: &statement.sql,
            parameters: statement.parameters.iter().map(SqlParameter::from).collect(),
            include_result_metadata: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct SqlParameter<'a> {
    name: &'a str,
    value: Field,
}

impl<'a> From<&'a Parameter> for SqlParameter<'a> {
    fn from(p: &'a Parameter) -> Self {
        Self {
            name: &p.name,
            value: Field::from(&p.value),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Field {
    #[serde(skip_serializing_if = "Option::is_none")]
    is_null: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    boolean_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    long_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    double_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(skip_serializing, default)]
    array_value: Option<serde_json::Value>,
}

impl From<&Cell> for Field {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => Self {
                is_null: Some(true),
                ..Default::default()
            },
            Cell::Bool(b) => Self {
                boolean_value: Some(*b),
                ..Default::default()
            },
            Cell::Long(n) => Self {
                long_value: Some(*n),
                ..Default::default()
            },
            Cell::Double(d) => Self {
                double_value: Some(*d),
                ..Default::default()
            },
            Cell::String(s) => Self {
                string_value: Some(s.clone()),
                ..Default::default()
            },
        }
    }
}

impl From<Field> for Cell {
    fn from(field: Field) -> Self {
        if field.is_null == Some(true) {
            return Cell::Null;
        }
        if let Some(b) = field.boolean_value {
            return Cell::Bool(b);
        }
        if let Some(n) = field.long_value {
            return Cell::Long(n);
        }
        if let Some(d) = field.double_value {
            return Cell::Double(d);
        }
        if let Some(s) = field.string_value {
            return Cell::String(s);
        }
        match field.array_value {
            Some(array) => Cell::String(array.to_string()),
            None => Cell::Null,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteStatementResponse {
    #[serde(default)]
    records: Vec<Vec<Field>>,
}

impl From<ExecuteStatementResponse> for StatementResult {
    fn from(r: ExecuteStatementResponse) -> Self {
        let rows: Vec<Row> = r
            .records
            .into_iter()
            .map(|record| record.into_iter().map(Cell::from).collect())
            .collect();
        StatementResult::new(rows)
    }
}
