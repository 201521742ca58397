//! Scripted in-memory backend for tests.
//!
//! Records every statement it receives and answers from a script of
//! substring-matched responses and failures. Nothing is parsed: a statement
//! matching no response returns zero rows, which is also what DDL returns.

use crate::backend::StatementExecutor;
use crate::error::{Error, Result};
use crate::types::{Handles, Row, Statement, StatementResult};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct Response {
    pattern: String,
    rows: Vec<Row>,
}

#[derive(Debug, Clone)]
struct Failure {
    pattern: String,
    /// Matching executions to let through before failing.
    skip: usize,
    message: String,
    network: bool,
}

#[derive(Debug, Default)]
struct Script {
    responses: Vec<Response>,
    failures: Vec<Failure>,
    calls: Vec<(Handles, Statement)>,
}

/// Backend that records statements and replays scripted answers.
///
/// Cloning shares the script and the call log, so a test can keep one
/// handle for assertions while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    script: Arc<Mutex<Script>>,
}

impl ScriptedExecutor {
    /// Create an executor that returns zero rows for everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `pattern` with `rows`.
    ///
    /// The first registered matching response wins.
    pub fn respond(&self, pattern: impl Into<String>, rows: Vec<Row>) {
        self.lock().responses.push(Response {
            pattern: pattern.into(),
            rows,
        });
    }

    /// Reject every statement containing `pattern`.
    pub fn fail(&self, pattern: impl Into<String>, message: impl Into<String>) {
        self.fail_after(pattern, 0, message);
    }

    /// Let `skip` statements containing `pattern` through, then reject the rest.
    pub fn fail_after(&self, pattern: impl Into<String>, skip: usize, message: impl Into<String>) {
        self.lock().failures.push(Failure {
            pattern: pattern.into(),
            skip,
            message: message.into(),
            network: false,
        });
    }

    /// Fail every statement containing `pattern` as if the endpoint were down.
    pub fn disconnect(&self, pattern: impl Into<String>) {
        self.lock().failures.push(Failure {
            pattern: pattern.into(),
            skip: 0,
            message: "connection refused".to_string(),
            network: true,
        });
    }

    /// SQL text of every statement executed so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.lock().calls.iter().map(|(_, s)| s.sql.clone()).collect()
    }

    /// Every call so far with the handles it was made with.
    #[must_use]
    pub fn calls(&self) -> Vec<(Handles, Statement)> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls, keeping the script.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StatementExecutor for ScriptedExecutor {
    fn execute(&self, handles: &Handles, statement: &Statement) -> Result<StatementResult> {
        let mut script = self.lock();
        script.calls.push((handles.clone(), statement.clone()));

        for failure in &mut script.failures {
            if !statement.sql.contains(&failure.pattern) {
                continue;
            }
            if failure.skip > 0 {
                failure.skip -= 1;
                continue;
            }
            return Err(if failure.network {
                Error::http(failure.message.clone(), None)
            } else {
                Error::rejected(failure.message.clone())
            });
        }

        let rows = script
            .responses
            .iter()
            .find(|r| statement.sql.contains(&r.pattern))
            .map(|r| r.rows.clone())
            .unwrap_or_default();

        Ok(StatementResult::new(rows))
    }
}
