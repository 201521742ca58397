//! Statement execution backends.
//!
//! This module provides the [`StatementExecutor`] trait, the single seam
//! between reconciliation logic and the remote cluster. The production
//! implementation is [`http::HttpExecutor`]; [`scripted::ScriptedExecutor`]
//! stands in for it in tests.
//!
//! # Testing
//!
//! ```
//! use dataapi::{Cell, Handles, ScriptedExecutor, Statement, StatementExecutor};
//!
//! let executor = ScriptedExecutor::new();
//! executor.respond("FROM pg_roles", vec![vec![Cell::from("app")]]);
//!
//! let handles = Handles::new("arn:cluster", "arn:secret");
//! let result = executor
//!     .execute(&handles, &Statement::new("SELECT rolname FROM pg_roles"))
//!     .unwrap();
//! assert_eq!(result.len(), 1);
//! assert_eq!(executor.executed(), vec!["SELECT rolname FROM pg_roles"]);
//! ```

pub mod http;
pub mod scripted;

use crate::error::Result;
use crate::types::{Handles, Statement, StatementResult};

/// Executes exactly one statement per call against the remote cluster.
///
/// Implementations must not retry, batch, or wrap statements in a
/// transaction, and must not rewrite the SQL text: quoting is the caller's
/// job. A failure is returned as-is.
pub trait StatementExecutor: Send + Sync {
    /// Execute a statement and return its rows.
    fn execute(&self, handles: &Handles, statement: &Statement) -> Result<StatementResult>;
}

impl<T: StatementExecutor + ?Sized> StatementExecutor for std::sync::Arc<T> {
    fn execute(&self, handles: &Handles, statement: &Statement) -> Result<StatementResult> {
        (**self).execute(handles, statement)
    }
}

impl<T: StatementExecutor + ?Sized> StatementExecutor for &T {
    fn execute(&self, handles: &Handles, statement: &Statement) -> Result<StatementResult> {
        (**self).execute(handles, statement)
    }
}
