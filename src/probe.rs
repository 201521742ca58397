//! Existence checks against the system catalogs.
//!
//! Zero rows means "not found" and is not an error. Names are bound as
//! parameters, never interpolated.

use crate::error::Result;
use crate::session::Session;
use dataapi::{Handles, Statement};

const DATABASE_EXISTS: &str = "SELECT 1 FROM pg_catalog.pg_database WHERE datname = :name";
const SCHEMA_EXISTS: &str = "SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname = :name";
const ROLE_EXISTS: &str = "SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = :name";

pub struct ExistenceProbe<'a> {
    session: &'a Session,
    handles: &'a Handles,
}

impl<'a> ExistenceProbe<'a> {
    /// Probe the catalogs visible through `handles`
    ///
    /// Schemas are per-database, so `handles` should target the database
    /// the schema lives in.
    pub fn new(session: &'a Session, handles: &'a Handles) -> Self {
        Self { session, handles }
    }

    pub fn database_exists(&self, name: &str) -> Result<bool> {
        self.lookup(DATABASE_EXISTS, name)
    }

    pub fn schema_exists(&self, name: &str) -> Result<bool> {
        self.lookup(SCHEMA_EXISTS, name)
    }

    pub fn role_exists(&self, name: &str) -> Result<bool> {
        self.lookup(ROLE_EXISTS, name)
    }

    fn lookup(&self, sql: &str, name: &str) -> Result<bool> {
        let statement = Statement::new(sql).bind("name", name);
        let result = self.session.run(self.handles, &statement)?;
        Ok(!result.is_empty())
    }
}
