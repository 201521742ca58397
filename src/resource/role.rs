//! Role reconciler
//!
//! Create always spells out every attribute in its positive or negative
//! form, then grants the requested memberships one statement at a time.
//! Update only renames and toggles LOGIN; other attribute changes are
//! reported but left for the operator.

use super::{Instance, ReadOutcome, Reconciler, ResourceKind, lock_key};
use crate::error::{ReconcileError, Result, ident};
use crate::session::Session;
use dataapi::{Handles, Statement, quote_literal};
use log::{info, warn};
use serde::{Deserialize, Serialize};

const READ_ROLE: &str = "SELECT rolname, rolsuper, rolinherit, rolcreaterole, rolcreatedb, rolcanlogin \
     FROM pg_catalog.pg_roles WHERE rolname = :name";

/// Desired settings of one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    #[serde(default)]
    pub login: bool,
    #[serde(default = "default_inherit")]
    pub inherit: bool,
    #[serde(default)]
    pub create_database: bool,
    #[serde(default)]
    pub create_role: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub superuser: bool,
    #[serde(default)]
    pub member_roles: Vec<String>,
    pub handles: Handles,
}

fn default_inherit() -> bool {
    true
}

impl RoleConfig {
    /// Attribute keywords in CREATE ROLE order
    fn attributes(&self) -> [&'static str; 5] {
        [
            if self.superuser { "SUPERUSER" } else { "NOSUPERUSER" },
            if self.create_role { "CREATEROLE" } else { "NOCREATEROLE" },
            if self.create_database { "CREATEDB" } else { "NOCREATEDB" },
            if self.inherit { "INHERIT" } else { "NOINHERIT" },
            if self.login { "LOGIN" } else { "NOLOGIN" },
        ]
    }

    /// Password to set, treating an empty string as none
    fn effective_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Names of settings that Update leaves untouched but differ in `other`
    fn unsynchronized(&self, other: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.superuser != other.superuser {
            fields.push("superuser");
        }
        if self.inherit != other.inherit {
            fields.push("inherit");
        }
        if self.create_database != other.create_database {
            fields.push("create_database");
        }
        if self.create_role != other.create_role {
            fields.push("create_role");
        }
        if self.effective_password() != other.effective_password() {
            fields.push("password");
        }
        let mut mine = self.member_roles.clone();
        let mut theirs = other.member_roles.clone();
        mine.sort();
        theirs.sort();
        if mine != theirs {
            fields.push("member_roles");
        }
        fields
    }
}

#[derive(Debug)]
pub struct RoleReconciler {
    session: Session,
}

impl RoleReconciler {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn read_statement(name: &str) -> Statement {
        Statement::new(READ_ROLE).bind("name", name)
    }

    fn create_statement(config: &RoleConfig) -> Result<Statement> {
        let head = format!(
            "CREATE ROLE {} WITH {}",
            ident("name", &config.name)?,
            config.attributes().join(" ")
        );
        Ok(match config.effective_password() {
            Some(password) => Statement::new(format!("{head} PASSWORD {}", quote_literal(password)))
                .redacted(format!("{head} PASSWORD '********'")),
            None => Statement::new(head),
        })
    }
}

impl Reconciler for RoleReconciler {
    type Config = RoleConfig;

    const KIND: ResourceKind = ResourceKind::Role;

    fn identity(config: &RoleConfig) -> String {
        config.name.clone()
    }

    fn summary(config: &RoleConfig) -> String {
        let mut summary = config
            .attributes()
            .iter()
            .filter(|a| !a.starts_with("NO"))
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if summary.is_empty() {
            summary.push_str("NOLOGIN");
        }
        if !config.member_roles.is_empty() {
            summary.push_str(&format!("; member of {}", config.member_roles.join(", ")));
        }
        summary
    }

    fn comparable(config: &RoleConfig) -> RoleConfig {
        RoleConfig {
            name: config.name.clone(),
            login: config.login,
            handles: config.handles.clone(),
            inherit: true,
            create_database: false,
            create_role: false,
            password: None,
            superuser: false,
            member_roles: Vec::new(),
        }
    }

    fn independent(config: &RoleConfig) -> bool {
        config.member_roles.is_empty()
    }

    fn create(&self, instance: &mut Instance<RoleConfig>) -> Result<()> {
        let config = &instance.config;
        let role = ident("name", &config.name)?;
        let create = Self::create_statement(config)?;
        let memberships = config
            .member_roles
            .iter()
            .map(|member| {
                Ok(Statement::new(format!(
                    "GRANT {} TO {role}",
                    ident("member_roles", member)?
                )))
            })
            .collect::<Result<Vec<_>>>()?;

        let _guard = self
            .session
            .locks()
            .acquire(lock_key(Self::KIND, &config.name));

        self.session.run(&config.handles, &create)?;
        info!("created role {}", config.name);
        instance.id = Some(config.name.clone());

        for (index, statement) in memberships.iter().enumerate() {
            self.session
                .run(&instance.config.handles, statement)
                .map_err(|e| e.after(index + 1))?;
        }
        Ok(())
    }

    fn read(&self, instance: &mut Instance<RoleConfig>) -> Result<ReadOutcome> {
        let name = instance.config.name.clone();
        let result = self
            .session
            .run(&instance.config.handles, &Self::read_statement(&name))?;

        let outcome = ReadOutcome::from_row_count(result.len());
        match (outcome, result.single()) {
            (ReadOutcome::Found, Some(row)) => {
                let flag = |index: usize, current: bool| {
                    row.get(index).and_then(|c| c.as_bool()).unwrap_or(current)
                };
                let config = &mut instance.config;
                if let Some(found) = row.first().and_then(|c| c.as_str()) {
                    config.name = found.to_string();
                }
                config.superuser = flag(1, config.superuser);
                config.inherit = flag(2, config.inherit);
                config.create_role = flag(3, config.create_role);
                config.create_database = flag(4, config.create_database);
                config.login = flag(5, config.login);
                instance.id = Some(config.name.clone());
            }
            (ReadOutcome::Ambiguous { rows }, _) => {
                warn!("role {name}: expected one catalog row, got {rows}; treating as gone");
                instance.id = None;
            }
            _ => {
                if instance.is_tracked() {
                    warn!("role {name} no longer exists");
                }
                instance.id = None;
            }
        }
        Ok(outcome)
    }

    fn update(&self, instance: &mut Instance<RoleConfig>, desired: &RoleConfig) -> Result<()> {
        let current = instance.config.clone();
        let rename = desired.name != current.name;
        let relogin = desired.login != current.login;

        if rename && desired.name.is_empty() {
            return Err(ReconcileError::validation(
                "name",
                format!("cannot rename role {} to an empty name", current.name),
            ));
        }

        let mut statements = Vec::new();
        if rename {
            statements.push(Statement::new(format!(
                "ALTER ROLE {} RENAME TO {}",
                ident("name", &current.name)?,
                ident("name", &desired.name)?
            )));
        }
        if relogin {
            statements.push(Statement::new(format!(
                "ALTER ROLE {} WITH {}",
                ident("name", &desired.name)?,
                if desired.login { "LOGIN" } else { "NOLOGIN" }
            )));
        }

        let skipped = current.unsynchronized(desired);
        if !skipped.is_empty() {
            warn!(
                "role {}: changes to {} are not applied on update",
                desired.name,
                skipped.join(", ")
            );
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
                info!("renamed role {} to {}", current.name, desired.name);
                instance.config.name = desired.name.clone();
                instance.id = Some(desired.name.clone());
            }
        }

        instance.config = desired.clone();
        instance.id = Some(desired.name.clone());
        Ok(())
    }

    fn delete(&self, instance: &mut Instance<RoleConfig>) -> Result<()> {
        let config = &instance.config;
        let statement = Statement::new(format!("DROP ROLE {}", ident("name", &config.name)?));

        let _guard = self
            .session
            .locks()
            .acquire(lock_key(Self::KIND, &config.name));
        self.session.run(&config.handles, &statement)?;

        info!("dropped role {}", config.name);
        instance.id = None;
        Ok(())
    }

    fn exists(&self, config: &RoleConfig) -> Result<bool> {
        let result = self
            .session
            .run(&config.handles, &Self::read_statement(&config.name))?;
        Ok(result.len() == 1)
    }
}
