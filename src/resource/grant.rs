//! Grant reconciler
//!
//! A grant is identified by role, database, schema and object type. Its
//! privileges are the only thing an update changes, and Create and Update
//! run the same reset-and-reapply pair from [`privilege`](super::privilege).

use super::privilege;
use super::{Instance, ReadOutcome, Reconciler, ResourceKind, lock_key};
use crate::error::Result;
use crate::probe::ExistenceProbe;
use crate::session::Session;
use dataapi::Handles;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of schema objects a grant can cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Table,
    Sequence,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Sequence => "sequence",
        }
    }

    /// Keyword used in GRANT/REVOKE
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Sequence => "SEQUENCE",
        }
    }

    /// `pg_class.relkind` of objects of this type
    pub fn relkind(self) -> &'static str {
        match self {
            Self::Table => "r",
            Self::Sequence => "S",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "sequence" => Ok(Self::Sequence),
            other => Err(format!("unsupported object type {other:?} (expected table or sequence)")),
        }
    }
}

/// Desired privileges of a role on every object of one type in a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantConfig {
    pub role: String,
    pub database: String,
    pub schema: String,
    pub object_type: ObjectType,
    pub privileges: Vec<String>,
    pub handles: Handles,
}

impl GrantConfig {
    /// Handles connected to the grant's database, where the schema lives
    pub fn database_handles(&self) -> Handles {
        self.handles.on_database(&self.database)
    }
}

#[derive(Debug)]
pub struct GrantReconciler {
    session: Session,
}

impl GrantReconciler {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Role, then database, then schema; the first missing link wins
    fn dependencies_exist(&self, config: &GrantConfig) -> Result<bool> {
        let cluster = ExistenceProbe::new(&self.session, &config.handles);
        if !cluster.role_exists(&config.role)? {
            debug!("grant {}: role {} is missing", Self::identity(config), config.role);
            return Ok(false);
        }
        if !cluster.database_exists(&config.database)? {
            debug!("grant {}: database {} is missing", Self::identity(config), config.database);
            return Ok(false);
        }

        let handles = config.database_handles();
        let database = ExistenceProbe::new(&self.session, &handles);
        if !database.schema_exists(&config.schema)? {
            debug!("grant {}: schema {} is missing", Self::identity(config), config.schema);
            return Ok(false);
        }
        Ok(true)
    }
}

impl Reconciler for GrantReconciler {
    type Config = GrantConfig;

    const KIND: ResourceKind = ResourceKind::Grant;

    fn identity(config: &GrantConfig) -> String {
        [
            config.role.as_str(),
            config.database.as_str(),
            config.schema.as_str(),
            config.object_type.as_str(),
        ]
        .join("_")
    }

    fn summary(config: &GrantConfig) -> String {
        format!(
            "{} on {}s in {}.{} to {}",
            config.privileges.join(","),
            config.object_type,
            config.database,
            config.schema,
            config.role
        )
    }

    fn requires_replacement(prior: &GrantConfig, desired: &GrantConfig) -> bool {
        Self::identity(prior) != Self::identity(desired)
    }

    fn create(&self, instance: &mut Instance<GrantConfig>) -> Result<()> {
        let config = &instance.config;
        let identity = Self::identity(config);
        let statements = privilege::reset_and_reapply(config)?;

        let _guard = self.session.locks().acquire(lock_key(Self::KIND, &identity));
        self.session
            .run_all(&config.database_handles(), &statements)?;

        info!("granted {}", Self::summary(config));
        instance.id = Some(identity);
        Ok(())
    }

    fn read(&self, instance: &mut Instance<GrantConfig>) -> Result<ReadOutcome> {
        let identity = Self::identity(&instance.config);

        if !self.dependencies_exist(&instance.config)? {
            if instance.is_tracked() {
                warn!("grant {identity} no longer applies: its role, database or schema is gone");
            }
            instance.id = None;
            return Ok(ReadOutcome::NotFound);
        }

        // Only the row count decides presence; held privileges are never compared with the desired set.
        let held = self.session.run(
            &instance.config.database_handles(),
            &privilege::privileges_held(&instance.config),
        )?;
        for row in &held.rows {
            let relation = row.first().and_then(|c| c.as_str()).unwrap_or("?");
            let privileges = row.get(1).and_then(|c| c.as_str()).unwrap_or("");
            debug!("grant {identity}: {relation} holds [{privileges}]");
        }

        let outcome = ReadOutcome::from_row_count(held.len());
        match outcome {
            ReadOutcome::Found => instance.id = Some(identity),
            ReadOutcome::Ambiguous { rows } => {
                warn!("grant {identity}: expected one privilege row, got {rows}; treating as gone");
                instance.id = None;
            }
            ReadOutcome::NotFound => {
                if instance.is_tracked() {
                    warn!("grant {identity}: no privilege row found");
                }
                instance.id = None;
            }
        }
        Ok(outcome)
    }

    fn update(&self, instance: &mut Instance<GrantConfig>, desired: &GrantConfig) -> Result<()> {
        let mut next = Instance {
            id: instance.id.clone(),
            config: desired.clone(),
        };
        self.create(&mut next)?;
        *instance = next;
        Ok(())
    }

    fn delete(&self, instance: &mut Instance<GrantConfig>) -> Result<()> {
        let config = &instance.config;
        let identity = Self::identity(config);
        let statement = privilege::revoke_all(config.object_type, &config.schema, &config.role)?;

        let _guard = self.session.locks().acquire(lock_key(Self::KIND, &identity));
        self.session.run(&config.database_handles(), &statement)?;

        info!("revoked grant {identity}");
        instance.id = None;
        Ok(())
    }

    fn exists(&self, config: &GrantConfig) -> Result<bool> {
        let mut probe = Instance::new(config.clone());
        Ok(self.read(&mut probe)?.is_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use crate::session::testing::{handles, session};
    use dataapi::{Cell, ScriptedExecutor};
    use std::collections::BTreeSet;

    fn config(privileges: &[&str]) -> GrantConfig {
        GrantConfig {
            role: "app".into(),
            database: "app".into(),
            schema: "public".into(),
            object_type: ObjectType::Table,
            privileges: privileges.iter().map(ToString::to_string).collect(),
            handles: handles(),
        }
    }

    fn exists_row() -> Vec<Vec<Cell>> {
        vec![vec![Cell::Long(1)]]
    }

    fn script_present(executor: &ScriptedExecutor, role: bool, database: bool, schema: bool) {
        if role {
            executor.respond("FROM pg_catalog.pg_roles WHERE rolname", exists_row());
        }
        if database {
            executor.respond("FROM pg_catalog.pg_database", exists_row());
        }
        if schema {
            executor.respond("FROM pg_catalog.pg_namespace WHERE nspname", exists_row());
        }
    }

    #[test]
    fn test_create_statements() {
        let (session, executor) = session();
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::new(config(&["SELECT", "INSERT"]));

        reconciler.create(&mut instance).unwrap();

        assert_eq!(
            executor.executed(),
            [
                "REVOKE ALL PRIVILEGES ON ALL TABLES IN SCHEMA public FROM app",
                "GRANT SELECT,INSERT ON ALL TABLE IN SCHEMA public TO app",
            ]
        );
        assert_eq!(instance.id.as_deref(), Some("app_app_public_table"));
        for (handles, _) in executor.calls() {
            assert_eq!(handles.database.as_deref(), Some("app"));
        }
    }

    #[test]
    fn test_grant_failure_is_partial_and_leaves_identity_unset() {
        let (session, executor) = session();
        executor.fail("GRANT SELECT", "permission denied for schema public");
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::new(config(&["SELECT"]));

        let err = reconciler.create(&mut instance).unwrap_err();

        assert_eq!(err.kind(), FaultKind::PartialApply);
        assert!(instance.id.is_none());
    }

    #[test]
    fn test_invalid_privilege_issues_nothing() {
        let (session, executor) = session();
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::new(config(&["SELECT", "OWN EVERYTHING"]));

        let err = reconciler.create(&mut instance).unwrap_err();

        assert_eq!(err.kind(), FaultKind::Validation);
        assert!(executor.executed().is_empty());
    }

    /// Effective privileges of `app` on `public` tables after replaying the
    /// executed statements over a starting set
    fn effective(start: &[&str], executed: &[String]) -> BTreeSet<String> {
        let mut held: BTreeSet<String> = start.iter().map(ToString::to_string).collect();
        for sql in executed {
            if sql.starts_with("REVOKE ALL PRIVILEGES") {
                held.clear();
            } else if let Some(rest) = sql.strip_prefix("GRANT ") {
                let list = rest.split(' ').next().unwrap_or_default();
                held.extend(list.split(',').map(ToString::to_string));
            }
        }
        held
    }

    #[test]
    fn test_convergence_from_any_starting_set() {
        let desired = ["SELECT", "INSERT"];
        let starts: [&[&str]; 3] = [&[], &desired, &["DELETE", "TRUNCATE"]];

        let mut outcomes = Vec::new();
        for start in starts {
            let (session, executor) = session();
            let reconciler = GrantReconciler::new(session);
            let mut instance = Instance::tracked("app_app_public_table", config(start));
            reconciler.update(&mut instance, &config(&desired)).unwrap();
            outcomes.push(effective(start, &executor.executed()));
        }

        let expected: BTreeSet<String> = desired.iter().map(ToString::to_string).collect();
        assert!(outcomes.iter().all(|o| *o == expected));
    }

    #[test]
    fn test_read_not_found_when_role_missing() {
        let (session, executor) = session();
        script_present(&executor, false, true, true);
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::tracked("app_app_public_table", config(&["SELECT"]));

        assert_eq!(reconciler.read(&mut instance).unwrap(), ReadOutcome::NotFound);
        assert!(instance.id.is_none());
        assert_eq!(executor.executed().len(), 1);
    }

    #[test]
    fn test_read_not_found_when_database_missing() {
        let (session, executor) = session();
        script_present(&executor, true, false, true);
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::tracked("app_app_public_table", config(&["SELECT"]));

        assert_eq!(reconciler.read(&mut instance).unwrap(), ReadOutcome::NotFound);
        assert!(instance.id.is_none());
        assert_eq!(executor.executed().len(), 2);
    }

    #[test]
    fn test_read_not_found_when_schema_missing() {
        let (session, executor) = session();
        script_present(&executor, true, true, false);
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::tracked("app_app_public_table", config(&["SELECT"]));

        assert_eq!(reconciler.read(&mut instance).unwrap(), ReadOutcome::NotFound);
        assert!(instance.id.is_none());

        let calls = executor.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].0.database.as_deref(), Some("app"));
    }

    #[test]
    fn test_read_found_when_all_links_exist() {
        let (session, executor) = session();
        script_present(&executor, true, true, true);
        executor.respond(
            "aclexplode",
            vec![vec![Cell::from("orders"), Cell::from("SELECT")]],
        );
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::new(config(&["SELECT", "INSERT"]));

        assert!(reconciler.read(&mut instance).unwrap().is_found());
        assert_eq!(instance.id.as_deref(), Some("app_app_public_table"));
        // Held privileges do not rewrite the desired set.
        assert_eq!(instance.config.privileges, ["SELECT", "INSERT"]);
        assert_eq!(executor.executed().len(), 4);
    }

    #[test]
    fn test_read_not_found_without_privilege_rows() {
        let (session, executor) = session();
        script_present(&executor, true, true, true);
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::tracked("app_app_public_table", config(&["SELECT"]));

        assert_eq!(reconciler.read(&mut instance).unwrap(), ReadOutcome::NotFound);
        assert!(instance.id.is_none());
        assert_eq!(executor.executed().len(), 4);
    }

    #[test]
    fn test_read_ambiguous_with_several_privilege_rows() {
        let (session, executor) = session();
        script_present(&executor, true, true, true);
        executor.respond(
            "aclexplode",
            vec![
                vec![Cell::from("orders"), Cell::from("SELECT")],
                vec![Cell::from("invoices"), Cell::from("SELECT")],
            ],
        );
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::tracked("app_app_public_table", config(&["SELECT"]));

        assert_eq!(
            reconciler.read(&mut instance).unwrap(),
            ReadOutcome::Ambiguous { rows: 2 }
        );
        assert!(instance.id.is_none());
        assert!(!reconciler.exists(&config(&["SELECT"])).unwrap());
    }

    #[test]
    fn test_delete_revokes() {
        let (session, executor) = session();
        let reconciler = GrantReconciler::new(session);
        let mut instance = Instance::tracked("app_app_public_table", config(&["SELECT"]));

        reconciler.delete(&mut instance).unwrap();

        assert_eq!(
            executor.executed(),
            ["REVOKE ALL PRIVILEGES ON ALL TABLES IN SCHEMA public FROM app"]
        );
        assert!(instance.id.is_none());
    }

    #[test]
    fn test_identity_ignores_privileges() {
        let a = config(&["SELECT"]);
        let b = config(&["INSERT", "UPDATE"]);
        assert_eq!(GrantReconciler::identity(&a), GrantReconciler::identity(&b));
        assert!(!GrantReconciler::requires_replacement(&a, &b));

        let mut c = config(&["SELECT"]);
        c.schema = "reporting".into();
        assert!(GrantReconciler::requires_replacement(&a, &c));
    }

    #[test]
    fn test_object_type_parsing() {
        assert_eq!("sequence".parse::<ObjectType>(), Ok(ObjectType::Sequence));
        assert!("view".parse::<ObjectType>().is_err());
        assert_eq!(ObjectType::Table.relkind(), "r");
    }
}
