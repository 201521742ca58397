//! # dataapi
//!
//! Statement execution against a PostgreSQL cluster whose only access path
//! is an RDS Data API style endpoint.
//!
//! Every call carries two opaque handles (the cluster resource ARN and the
//! credential secret ARN) plus exactly one SQL statement. There are no
//! transactions, no retries and no implicit escaping: callers quote
//! identifiers with [`quote_ident`] and bind values as named parameters.
//!
//! ## Example
//!
//! ```no_run
//! use dataapi::{Handles, HttpExecutor, Statement, StatementExecutor};
//!
//! let executor = HttpExecutor::new("http://localhost:8080");
//! let handles = Handles::new(
//!     "arn:aws:rds:us-east-1:123456789012:cluster:main",
//!     "arn:aws:secretsmanager:us-east-1:123456789012:secret:dba",
//! );
//!
//! let statement = Statement::new("SELECT 1 FROM pg_roles WHERE rolname = :name")
//!     .bind("name", "app");
//! let result = executor.execute(&handles, &statement).expect("query failed");
//! println!("role exists: {}", !result.is_empty());
//! ```
//!
//! ## Testing
//!
//! [`ScriptedExecutor`] records statements and answers from a script, so
//! reconciliation logic can be exercised without a cluster.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod quote;
pub mod types;

pub use backend::StatementExecutor;
pub use backend::http::HttpExecutor;
pub use backend::scripted::ScriptedExecutor;
pub use error::{Error, ErrorCategory, Result};
pub use quote::{quote_ident, quote_literal};
pub use types::{Cell, Handles, Parameter, Row, Statement, StatementResult};
