//! Core types for statement execution.
//!
//! A statement result carries no schema metadata: cells are addressed by
//! position, in the order of the `SELECT` list.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handles bound to the remote cluster and its credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handles {
    /// ARN of the cluster the statement runs on.
    pub resource_arn: String,
    /// ARN of the secret holding the credential used to connect.
    pub secret_arn: String,
    /// Database to connect to; the endpoint default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Handles {
    /// Create handles targeting the endpoint's default database.
    pub fn new(resource_arn: impl Into<String>, secret_arn: impl Into<String>) -> Self {
        Self {
            resource_arn: resource_arn.into(),
            secret_arn: secret_arn.into(),
            database: None,
        }
    }

    /// Same handles, connected to a specific database.
    #[must_use]
    pub fn on_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..self.clone()
        }
    }
}

/// A single scalar value, either returned in a row or bound as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Long(i64),
    /// Floating point value.
    Double(f64),
    /// Text value (also used for arrays and other types the endpoint stringifies).
    String(String),
}

impl Cell {
    /// Borrow the text value, if this is a string cell.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the cell as a boolean.
    ///
    /// Accepts boolean cells as well as the textual forms PostgreSQL uses
    /// when a boolean column is stringified (`t`/`f`, `true`/`false`).
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) => match s.as_str() {
                "t" | "true" | "TRUE" => Some(true),
                "f" | "false" | "FALSE" => Some(false),
                _ => None,
            },
            Self::Long(n) => Some(*n != 0),
            _ => None,
        }
    }

    /// Interpret the cell as an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Whether the cell is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

/// One returned row; cells follow the `SELECT` list order.
pub type Row = Vec<Cell>;

/// A named parameter bound by the endpoint (`:name` in the SQL text).
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name without the leading colon.
    pub name: String,
    /// Bound value.
    pub value: Cell,
}

/// One SQL statement plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement text sent to the endpoint.
    pub sql: String,
    /// Named parameters.
    pub parameters: Vec<Parameter>,
    redacted: Option<String>,
}

impl Statement {
    /// Create a statement with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
            redacted: None,
        }
    }

    /// Bind a named parameter.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Text to show in logs and errors instead of the real statement.
    ///
    /// Used when the statement embeds a secret that cannot be bound as a
    /// parameter (for example `PASSWORD '...'` in DDL).
    #[must_use]
    pub fn redacted(mut self, display: impl Into<String>) -> Self {
        self.redacted = Some(display.into());
        self
    }

    /// Whether the statement text is hidden from display.
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        self.redacted.is_some()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.redacted {
            Some(display) => write!(f, "{}", display),
            None => write!(f, "{}", self.sql),
        }
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// Rows returned by one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementResult {
    /// Returned rows, empty for DDL.
    pub rows: Vec<Row>,
}

impl StatementResult {
    /// Create a result from rows.
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Result of a statement that returns no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The row, if exactly one was returned.
    #[must_use]
    pub fn single(&self) -> Option<&Row> {
        match self.rows.as_slice() {
            [row] => Some(row),
            _ => None,
        }
    }
}
