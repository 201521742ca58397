//! Reconcilers for PostgreSQL objects
//!
//! Each object kind (database, role, grant) has a reconciler that turns a
//! typed desired configuration into SQL statements:
//! - Create/Update/Delete mutate the remote object under a keyed lock
//! - Read refreshes the local snapshot and detects out-of-band deletion
//!
//! [`Managed`] adapts any reconciler to the `declarative` framework so the
//! engine can plan and execute them uniformly.

pub mod database;
pub mod grant;
pub mod managed;
pub mod privilege;
pub mod role;

pub use database::{DatabaseConfig, DatabaseReconciler};
pub use grant::{GrantConfig, GrantReconciler, ObjectType};
pub use managed::{Change, Managed};
pub use role::{RoleConfig, RoleReconciler};

use crate::error::Result;
use crate::session::Session;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Object kinds managed by pgconverge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Database,
    Role,
    Grant,
}

impl ResourceKind {
    /// Address prefix, as in `role.app`
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Role => "role",
            Self::Grant => "grant",
        }
    }

    /// Resource type reported to the declarative framework
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::Database => "postgres_database",
            Self::Role => "postgres_role",
            Self::Grant => "postgres_grant",
        }
    }

    pub fn address(self, key: &str) -> String {
        format!("{}.{key}", self.prefix())
    }

    /// Split `role.app` into its kind and key
    pub fn parse_address(address: &str) -> Option<(Self, &str)> {
        let (prefix, key) = address.split_once('.')?;
        let kind = match prefix {
            "database" => Self::Database,
            "role" => Self::Role,
            "grant" => Self::Grant,
            _ => return None,
        };
        (!key.is_empty()).then_some((kind, key))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One managed object: its identity (once known) and its configuration
///
/// `id` is `None` until a Create succeeds or a Read matches, and is cleared
/// again when a Read finds the object gone.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance<C> {
    pub id: Option<String>,
    pub config: C,
}

impl<C> Instance<C> {
    /// An instance not yet known to exist remotely
    pub fn new(config: C) -> Self {
        Self { id: None, config }
    }

    /// An instance previously recorded under `id`
    pub fn tracked(id: impl Into<String>, config: C) -> Self {
        Self {
            id: Some(id.into()),
            config,
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.id.is_some()
    }
}

/// What a Read found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Exactly one match; the instance was refreshed
    Found,
    /// No match; the object was deleted out of band
    NotFound,
    /// More than one row where one was expected; handled like NotFound
    Ambiguous { rows: usize },
}

impl ReadOutcome {
    pub fn from_row_count(rows: usize) -> Self {
        match rows {
            0 => Self::NotFound,
            1 => Self::Found,
            rows => Self::Ambiguous { rows },
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, Self::Found)
    }
}

/// CRUD state machine for one object kind
///
/// Mutating calls take the keyed lock(s) for the object names they touch
/// before issuing any statement and release them on every exit path.
pub trait Reconciler: Send + Sync + fmt::Debug + 'static {
    type Config: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync;

    const KIND: ResourceKind;

    /// Natural identity of the object described by `config`
    fn identity(config: &Self::Config) -> String;

    /// One-line rendering used in plan output
    fn summary(config: &Self::Config) -> String;

    /// Whether moving from `prior` to `desired` needs a delete and a fresh
    /// create instead of an in-place update
    fn requires_replacement(_prior: &Self::Config, _desired: &Self::Config) -> bool {
        false
    }

    /// The part of `config` that an in-place update can change
    ///
    /// Drift outside this projection never plans an update.
    fn comparable(config: &Self::Config) -> Self::Config {
        config.clone()
    }

    /// Whether the object can be created alongside others of its kind
    fn independent(_config: &Self::Config) -> bool {
        true
    }

    fn create(&self, instance: &mut Instance<Self::Config>) -> Result<()>;

    /// Refresh `instance` from the remote catalog
    ///
    /// Clears the identity unless exactly one match is found.
    fn read(&self, instance: &mut Instance<Self::Config>) -> Result<ReadOutcome>;

    fn update(&self, instance: &mut Instance<Self::Config>, desired: &Self::Config) -> Result<()>;

    fn delete(&self, instance: &mut Instance<Self::Config>) -> Result<()>;

    /// Whether the object described by `config` currently exists
    fn exists(&self, config: &Self::Config) -> Result<bool>;
}

/// The three reconcilers sharing one session
#[derive(Debug, Clone)]
pub struct Reconcilers {
    pub databases: Arc<DatabaseReconciler>,
    pub roles: Arc<RoleReconciler>,
    pub grants: Arc<GrantReconciler>,
}

impl Reconcilers {
    pub fn new(session: &Session) -> Self {
        Self {
            databases: Arc::new(DatabaseReconciler::new(session.clone())),
            roles: Arc::new(RoleReconciler::new(session.clone())),
            grants: Arc::new(GrantReconciler::new(session.clone())),
        }
    }
}

/// Lock key for an object of `kind` named `name`
pub(crate) fn lock_key(kind: ResourceKind, name: &str) -> String {
    format!("{kind}:{name}")
}
