//! Database reconciler

use super::{Instance, ReadOutcome, Reconciler, ResourceKind, lock_key};
use crate::error::{ReconcileError, Result, ident};
use crate::session::Session;
use dataapi::{Handles, Statement};
use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OWNER: &str = "postgres";

const READ_DATABASE: &str = "SELECT d.datname, pg_catalog.pg_get_userbyid(d.datdba) \
     FROM pg_catalog.pg_database d WHERE d.datname = :name";

/// Desired settings of one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    pub handles: Handles,
}

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

#[derive(Debug)]
pub struct DatabaseReconciler {
    session: Session,
}

impl DatabaseReconciler {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn read_statement(name: &str) -> Statement {
        Statement::new(READ_DATABASE).bind("name", name)
    }
}

impl Reconciler for DatabaseReconciler {
    type Config = DatabaseConfig;

    const KIND: ResourceKind = ResourceKind::Database;

    fn identity(config: &DatabaseConfig) -> String {
        config.name.clone()
    }

    fn summary(config: &DatabaseConfig) -> String {
        format!("owner {}", config.owner)
    }

    fn create(&self, instance: &mut Instance<DatabaseConfig>) -> Result<()> {
        let config = &instance.config;
        let statement = Statement::new(format!(
            "CREATE DATABASE {} OWNER {}",
            ident("name", &config.name)?,
            ident("owner", &config.owner)?
        ));

        let _guard = self
            .session
            .locks()
            .acquire(lock_key(Self::KIND, &config.name));
        self.session.run(&config.handles, &statement)?;

        info!("created database {}", config.name);
        instance.id = Some(config.name.clone());
        Ok(())
    }

    fn read(&self, instance: &mut Instance<DatabaseConfig>) -> Result<ReadOutcome> {
        let name = instance.config.name.clone();
        let result = self
            .session
            .run(&instance.config.handles, &Self::read_statement(&name))?;

        let outcome = ReadOutcome::from_row_count(result.len());
        match (outcome, result.single()) {
            (ReadOutcome::Found, Some(row)) => {
                if let Some(found) = row.first().and_then(|c| c.as_str()) {
                    instance.config.name = found.to_string();
                }
                if let Some(owner) = row.get(1).and_then(|c| c.as_str()) {
                    instance.config.owner = owner.to_string();
                }
                instance.id = Some(instance.config.name.clone());
            }
            (ReadOutcome::Ambiguous { rows }, _) => {
                warn!("database {name}: expected one catalog row, got {rows}; treating as gone");
                instance.id = None;
            }
            _ => {
                if instance.is_tracked() {
                    warn!("database {name} no longer exists");
                }
                instance.id = None;
            }
        }
        Ok(outcome)
    }

    fn update(&self, instance: &mut Instance<DatabaseConfig>, desired: &DatabaseConfig) -> Result<()> {
        let current = instance.config.clone();
        let rename = desired.name != current.name;
        let reown = desired.owner != current.owner;

        if rename && desired.name.is_empty() {
            return Err(ReconcileError::validation(
                "name",
                format!("cannot rename database {} to an empty name", current.name),
            ));
        }
        if reown && desired.owner.is_empty() {
            return Err(ReconcileError::validation(
                "owner",
                format!("cannot give database {} an empty owner", current.name),
            ));
        }

        let mut statements = Vec::new();
        if rename {
            statements.push(Statement::new(format!(
                "ALTER DATABASE {} RENAME TO {}",
                ident("name", &current.name)?,
                ident("name", &desired.name)?
            )));
        }
        if reown {
            statements.push(Statement::new(format!(
                "ALTER DATABASE {} OWNER TO {}",
                ident("name", &desired.name)?,
                ident("owner", &desired.owner)?
            )));
        }

        let _guard = self.session.locks().acquire_all([
            lock_key(Self::KIND, &current.name),
            lock_key(Self::KIND, &desired.name),
        ]);

        for (completed, statement) in statements.iter().enumerate() {
            self.session
                .run(&desired.handles, statement)
                .map_err(|e| e.after(completed))?;
            if rename && completed == 0 {
                info!("renamed database {} to {}", current.name, desired.name);
                instance.config.name = desired.name.clone();
                instance.id = Some(desired.name.clone());
            }
        }

        instance.config = desired.clone();
        instance.id = Some(desired.name.clone());
        Ok(())
    }

    fn delete(&self, instance: &mut Instance<DatabaseConfig>) -> Result<()> {
        let config = &instance.config;
        let statement = Statement::new(format!("DROP DATABASE {}", ident("name", &config.name)?));

        let _guard = self
            .session
            .locks()
            .acquire(lock_key(Self::KIND, &config.name));
        self.session.run(&config.handles, &statement)?;

        info!("dropped database {}", config.name);
        instance.id = None;
        Ok(())
    }

    fn exists(&self, config: &DatabaseConfig) -> Result<bool> {
        let result = self
            .session
            .run(&config.handles, &Self::read_statement(&config.name))?;
        Ok(result.len() == 1)
    }
}
