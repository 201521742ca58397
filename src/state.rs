//! Local record of what pgconverge manages
//!
//! The remote catalogs say what exists; they do not say which objects this
//! tool owns or what they were last configured as (passwords and role
//! memberships cannot be read back). The state file keeps, per address,
//! the object's identity and last applied configuration.

use crate::resource::{Instance, ResourceKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// State Structures
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConvergeState {
    /// Managed objects by address (`role.app`)
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    /// Remote identity (object name, or composite key for grants)
    pub id: String,
    pub last_updated: DateTime<Utc>,
    /// Last applied configuration
    pub config: toml::Value,
}

impl Default for ConvergeState {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// ConvergeState Implementation
// ============================================================================

impl ConvergeState {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, using empty state", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save state to disk, stamping `last_updated`
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Utc::now();
        let content = toml::to_string_pretty(&self).context("Failed to serialize state to TOML")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Record that `address` exists remotely as `id` with `config`
    pub fn record<C: Serialize>(
        &mut self,
        address: &str,
        kind: ResourceKind,
        id: &str,
        config: &C,
    ) -> Result<()> {
        let config = toml::Value::try_from(config)
            .with_context(|| format!("Failed to serialize configuration of {address}"))?;
        let now = Utc::now();
        self.resources.insert(
            address.to_string(),
            ResourceRecord {
                kind,
                id: id.to_string(),
                last_updated: now,
                config,
            },
        );
        self.last_updated = now;
        Ok(())
    }

    /// Stop tracking `address`
    pub fn forget(&mut self, address: &str) -> Option<ResourceRecord> {
        let removed = self.resources.remove(address);
        if removed.is_some() {
            self.last_updated = Utc::now();
        }
        removed
    }

    pub fn get(&self, address: &str) -> Option<&ResourceRecord> {
        self.resources.get(address)
    }

    /// Decode the recorded instance at `address`
    pub fn instance<C: DeserializeOwned>(&self, address: &str) -> Result<Option<Instance<C>>> {
        let Some(record) = self.resources.get(address) else {
            return Ok(None);
        };
        let config: C = record
            .config
            .clone()
            .try_into()
            .with_context(|| format!("State entry {address} does not match its kind"))?;
        Ok(Some(Instance::tracked(record.id.clone(), config)))
    }

    /// Addresses recorded for `kind`, in address order
    pub fn addresses(&self, kind: ResourceKind) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .filter(move |(_, record)| record.kind == kind)
            .map(|(address, _)| address.as_str())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

// ============================================================================
// Shared ledger
// ============================================================================

/// State shared by concurrently applied resources, saved between stages
#[derive(Debug, Clone)]
pub struct Ledger {
    state: Arc<Mutex<ConvergeState>>,
    path: PathBuf,
}

impl Ledger {
    pub fn new(state: ConvergeState, path: PathBuf) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record<C: Serialize>(
        &self,
        address: &str,
        kind: ResourceKind,
        id: &str,
        config: &C,
    ) -> Result<()> {
        self.lock().record(address, kind, id, config)
    }

    pub fn forget(&self, address: &str) {
        self.lock().forget(address);
    }

    pub fn save(&self) -> Result<()> {
        self.lock().save(&self.path)
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ConvergeState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ConvergeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DatabaseConfig, RoleConfig};
    use dataapi::Handles;
    use tempfile::TempDir;

    fn database(name: &str) -> DatabaseConfig {
        DatabaseConfig {
            name: name.into(),
            owner: "postgres".into(),
            handles: Handles::new("arn:cluster", "arn:secret"),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = ConvergeState::load(&dir.path().join("absent.toml")).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut state = ConvergeState::default();
        state
            .record("database.app", ResourceKind::Database, "app", &database("app"))
            .unwrap();
        state.save(&path).unwrap();

        let loaded = ConvergeState::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        let instance: Instance<DatabaseConfig> = loaded.instance("database.app").unwrap().unwrap();
        assert_eq!(instance.id.as_deref(), Some("app"));
        assert_eq!(instance.config, database("app"));
    }

    #[test]
    fn test_optional_password_round_trips() {
        let role = RoleConfig {
            name: "app".into(),
            login: true,
            inherit: true,
            create_database: false,
            create_role: false,
            password: None,
            superuser: false,
            member_roles: vec!["readers".into()],
            handles: Handles::new("arn:cluster", "arn:secret").on_database("app"),
        };
        let mut state = ConvergeState::default();
        state.record("role.app", ResourceKind::Role, "app", &role).unwrap();

        let text = toml::to_string_pretty(&state).unwrap();
        let reparsed: ConvergeState = toml::from_str(&text).unwrap();
        let instance: Instance<RoleConfig> = reparsed.instance("role.app").unwrap().unwrap();
        assert_eq!(instance.config, role);
    }

    #[test]
    fn test_wrong_kind_is_an_error() {
        let mut state = ConvergeState::default();
        state
            .record("database.app", ResourceKind::Database, "app", &database("app"))
            .unwrap();
        assert!(state.instance::<RoleConfig>("database.app").is_err());
    }

    #[test]
    fn test_addresses_by_kind_and_forget() {
        let mut state = ConvergeState::default();
        state
            .record("database.b", ResourceKind::Database, "b", &database("b"))
            .unwrap();
        state
            .record("database.a", ResourceKind::Database, "a", &database("a"))
            .unwrap();

        let addresses: Vec<_> = state.addresses(ResourceKind::Database).collect();
        assert_eq!(addresses, ["database.a", "database.b"]);
        assert_eq!(state.addresses(ResourceKind::Role).count(), 0);

        assert!(state.forget("database.a").is_some());
        assert!(state.forget("database.a").is_none());
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_ledger_saves_to_its_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.toml");
        let ledger = Ledger::new(ConvergeState::default(), path.clone());

        ledger
            .record("database.app", ResourceKind::Database, "app", &database("app"))
            .unwrap();
        ledger.save().unwrap();

        assert_eq!(ConvergeState::load(&path).unwrap().len(), 1);
        ledger.forget("database.app");
        assert!(ledger.snapshot().is_empty());
    }
}
