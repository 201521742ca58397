//! Shared services handed to every reconciler: the statement executor and
//! the keyed-lock registry.

use crate::error::{ReconcileError, Result};
use dataapi::{Handles, Statement, StatementExecutor, StatementResult};
use declarative::KeyedLocks;
use log::debug;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Session {
    executor: Arc<dyn StatementExecutor>,
    locks: Arc<KeyedLocks>,
}

impl Session {
    pub fn new(executor: Arc<dyn StatementExecutor>, locks: Arc<KeyedLocks>) -> Self {
        Self { executor, locks }
    }

    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Execute one statement, attaching the statement text to any failure
    pub fn run(&self, handles: &Handles, statement: &Statement) -> Result<StatementResult> {
        match &handles.database {
            Some(db) => debug!("[{db}] {statement}"),
            None => debug!("{statement}"),
        }
        self.executor
            .execute(handles, statement)
            .map_err(|source| ReconcileError::Connectivity {
                statement: statement.to_string(),
                source,
            })
    }

    /// Execute an ordered list of statements, stopping at the first failure
    ///
    /// A failure after at least one success is reported as a partial apply.
    pub fn run_all(&self, handles: &Handles, statements: &[Statement]) -> Result<()> {
        for (completed, statement) in statements.iter().enumerate() {
            self.run(handles, statement)
                .map_err(|e| e.after(completed))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("held_locks", &self.locks.held_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use dataapi::ScriptedExecutor;

    pub fn session() -> (Session, ScriptedExecutor) {
        let executor = ScriptedExecutor::new();
        let session = Session::new(Arc::new(executor.clone()), Arc::new(KeyedLocks::new()));
        (session, executor)
    }

    pub fn handles() -> Handles {
        Handles::new("arn:aws:rds:us-east-1:1:cluster:main", "arn:aws:secretsmanager:us-east-1:1:secret:admin")
    }
}
