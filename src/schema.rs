//! Manifest schema
//!
//! The manifest is TOML. Raw tables are decoded with serde and then
//! validated into the typed configurations the reconcilers consume, so
//! nothing past this module deals with missing or empty fields.

use crate::resource::database::DEFAULT_OWNER;
use crate::resource::{DatabaseConfig, GrantConfig, ObjectType, ResourceKind, RoleConfig, privilege};
use anyhow::{Context, Result, bail};
use dataapi::Handles;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

// ============================================================================
// Raw Manifest
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub connection: ConnectionSection,

    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseEntry>,

    #[serde(default)]
    pub roles: BTreeMap<String, RoleEntry>,

    #[serde(default)]
    pub grants: BTreeMap<String, GrantEntry>,
}

/// Endpoint and default handles
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct ConnectionSection {
    /// Base URL of the Data API endpoint
    pub endpoint: Option<String>,
    pub resource_arn: Option<String>,
    pub secret_arn: Option<String>,
}

/// Handles that may be overridden per entry
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct HandleOverrides {
    pub resource_arn: Option<String>,
    pub secret_arn: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct DatabaseEntry {
    pub name: Option<String>,
    pub owner: Option<String>,
    #[serde(flatten)]
    pub handles: HandleOverrides,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct RoleEntry {
    pub name: Option<String>,
    #[serde(default)]
    pub login: bool,
    pub inherit: Option<bool>,
    #[serde(default)]
    pub create_database: bool,
    #[serde(default)]
    pub create_role: bool,
    pub password: Option<String>,
    #[serde(default)]
    pub superuser: bool,
    #[serde(default)]
    pub member_roles: Vec<String>,
    #[serde(flatten)]
    pub handles: HandleOverrides,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct GrantEntry {
    pub role: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub object_type: Option<String>,
    #[serde(default)]
    pub privileges: Vec<String>,
    #[serde(flatten)]
    pub handles: HandleOverrides,
}

// ============================================================================
// Typed desired state
// ============================================================================

/// Validated desired state, keyed by address (`role.app`)
#[derive(Debug, Default, Clone)]
pub struct DesiredState {
    pub databases: BTreeMap<String, DatabaseConfig>,
    pub roles: BTreeMap<String, RoleConfig>,
    pub grants: BTreeMap<String, GrantConfig>,
}

impl DesiredState {
    pub fn len(&self) -> usize {
        self.databases.len() + self.roles.len() + self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        content
            .parse()
            .with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Validate every entry into its typed configuration
    pub fn decode(&self) -> Result<DesiredState> {
        let mut desired = DesiredState::default();

        for (key, entry) in &self.databases {
            let address = ResourceKind::Database.address(key);
            let config = self
                .decode_database(entry)
                .with_context(|| format!("Invalid {address}"))?;
            desired.databases.insert(address, config);
        }
        for (key, entry) in &self.roles {
            let address = ResourceKind::Role.address(key);
            let config = self
                .decode_role(entry)
                .with_context(|| format!("Invalid {address}"))?;
            desired.roles.insert(address, config);
        }
        for (key, entry) in &self.grants {
            let address = ResourceKind::Grant.address(key);
            let config = self
                .decode_grant(entry)
                .with_context(|| format!("Invalid {address}"))?;
            desired.grants.insert(address, config);
        }

        ensure_unique("database", desired.databases.iter().map(|(a, c)| (a, c.name.clone())))?;
        ensure_unique("role", desired.roles.iter().map(|(a, c)| (a, c.name.clone())))?;
        ensure_unique(
            "grant",
            desired.grants.iter().map(|(a, c)| {
                (a, [c.role.as_str(), &c.database, &c.schema, c.object_type.as_str()].join("/"))
            }),
        )?;

        Ok(desired)
    }

    fn handles(&self, overrides: &HandleOverrides) -> Result<Handles> {
        let resource_arn = overrides
            .resource_arn
            .as_ref()
            .or(self.connection.resource_arn.as_ref());
        let secret_arn = overrides
            .secret_arn
            .as_ref()
            .or(self.connection.secret_arn.as_ref());
        Ok(Handles::new(
            required("resource_arn", resource_arn)?,
            required("secret_arn", secret_arn)?,
        ))
    }

    fn decode_database(&self, entry: &DatabaseEntry) -> Result<DatabaseConfig> {
        let owner = match &entry.owner {
            Some(owner) => required("owner", Some(owner))?,
            None => DEFAULT_OWNER.to_string(),
        };
        Ok(DatabaseConfig {
            name: required("name", entry.name.as_ref())?,
            owner,
            handles: self.handles(&entry.handles)?,
        })
    }

    fn decode_role(&self, entry: &RoleEntry) -> Result<RoleConfig> {
        let mut member_roles: Vec<String> = Vec::new();
        for member in &entry.member_roles {
            if member.trim().is_empty() {
                bail!("member_roles must not contain empty names");
            }
            unpadded("member_roles", member)?;
            if !member_roles.contains(member) {
                member_roles.push(member.clone());
            }
        }
        Ok(RoleConfig {
            name: required("name", entry.name.as_ref())?,
            login: entry.login,
            inherit: entry.inherit.unwrap_or(true),
            create_database: entry.create_database,
            create_role: entry.create_role,
            password: entry.password.clone().filter(|p| !p.is_empty()),
            superuser: entry.superuser,
            member_roles,
            handles: self.handles(&entry.handles)?,
        })
    }

    fn decode_grant(&self, entry: &GrantEntry) -> Result<GrantConfig> {
        let object_type: ObjectType = required("object_type", entry.object_type.as_ref())?
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        let privileges = privilege::normalize(&entry.privileges, object_type)?;
        Ok(GrantConfig {
            role: required("role", entry.role.as_ref())?,
            database: required("database", entry.database.as_ref())?,
            schema: required("schema", entry.schema.as_ref())?,
            object_type,
            privileges,
            handles: self.handles(&entry.handles)?,
        })
    }
}

impl std::str::FromStr for Manifest {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

fn required(field: &str, value: Option<&String>) -> Result<String> {
    let Some(value) = value else {
        bail!("{field} is required");
    };
    if value.trim().is_empty() {
        bail!("{field} must not be empty");
    }
    unpadded(field, value)?;
    Ok(value.clone())
}

/// Names are used verbatim, so surrounding whitespace is refused
fn unpadded(field: &str, value: &str) -> Result<()> {
    if value.trim() != value {
        bail!("{field} {value:?} has leading or trailing whitespace");
    }
    Ok(())
}

fn ensure_unique<'a>(
    kind: &str,
    identities: impl Iterator<Item = (&'a String, String)>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for (address, identity) in identities {
        if !seen.insert(identity.clone()) {
            bail!("{address} declares {kind} {identity} a second time");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EXAMPLE: &str = r#"
[connection]
endpoint = "http://localhost:8080"
resource_arn = "arn:aws:rds:us-east-1:123456789012:cluster:main"
secret_arn = "arn:aws:secretsmanager:us-east-1:123456789012:secret:admin"

[databases.app]
name = "app"
owner = "app_owner"

[databases.scratch]
name = "scratch"

[roles.app]
name = "app"
login = true
password = ""
member_roles = ["readers", "readers", "writers"]

[roles.readers]
name = "readers"
secret_arn = "arn:aws:secretsmanager:us-east-1:123456789012:secret:other"

[grants.app_tables]
role = "app"
database = "app"
schema = "public"
object_type = "table"
privileges = ["select", "INSERT"]
"#;

    #[test]
    fn test_parse_example_manifest() {
        let manifest: Manifest = EXAMPLE.parse().unwrap();
        let desired = manifest.decode().unwrap();

        assert_eq!(desired.len(), 5);

        let app = &desired.databases["database.app"];
        assert_eq!(app.owner, "app_owner");
        assert_eq!(desired.databases["database.scratch"].owner, "postgres");

        let role = &desired.roles["role.app"];
        assert!(role.login);
        assert!(role.inherit);
        assert_eq!(role.password, None);
        assert_eq!(role.member_roles, ["readers", "writers"]);

        let readers = &desired.roles["role.readers"];
        assert!(readers.handles.secret_arn.ends_with("secret:other"));
        assert!(readers.handles.resource_arn.ends_with("cluster:main"));

        let grant = &desired.grants["grant.app_tables"];
        assert_eq!(grant.object_type, ObjectType::Table);
        assert_eq!(grant.privileges, ["SELECT", "INSERT"]);
    }

    #[test]
    fn test_missing_name_names_the_address() {
        let manifest: Manifest = r#"
[connection]
resource_arn = "arn:cluster"
secret_arn = "arn:secret"

[roles.app]
login = true
"#
        .parse()
        .unwrap();

        let err = manifest.decode().unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("role.app"));
        assert!(message.contains("name is required"));
    }

    #[test]
    fn test_missing_handles() {
        let manifest: Manifest = "[databases.app]\nname = \"app\"\n".parse().unwrap();
        let err = manifest.decode().unwrap_err();
        assert!(format!("{err:#}").contains("resource_arn is required"));
    }

    #[test]
    fn test_empty_owner_rejected() {
        let manifest: Manifest = r#"
[connection]
resource_arn = "arn:cluster"
secret_arn = "arn:secret"

[databases.app]
name = "app"
owner = " "
"#
        .parse()
        .unwrap();
        assert!(format!("{:#}", manifest.decode().unwrap_err()).contains("owner must not be empty"));
    }

    #[test]
    fn test_padded_names_rejected() {
        let manifest: Manifest = r#"
[connection]
resource_arn = "arn:cluster"
secret_arn = "arn:secret"

[roles.app]
name = " app"
"#
        .parse()
        .unwrap();
        let err = format!("{:#}", manifest.decode().unwrap_err());
        assert!(err.contains("role.app"));
        assert!(err.contains("leading or trailing whitespace"));

        let manifest: Manifest = r#"
[connection]
resource_arn = "arn:cluster"
secret_arn = "arn:secret"

[roles.app]
name = "app"
member_roles = ["readers "]
"#
        .parse()
        .unwrap();
        assert!(format!("{:#}", manifest.decode().unwrap_err()).contains("member_roles"));
    }

    #[test]
    fn test_unknown_object_type() {
        let manifest: Manifest = r#"
[connection]
resource_arn = "arn:cluster"
secret_arn = "arn:secret"

[grants.views]
role = "app"
database = "app"
schema = "public"
object_type = "view"
privileges = ["SELECT"]
"#
        .parse()
        .unwrap();
        assert!(format!("{:#}", manifest.decode().unwrap_err()).contains("unsupported object type"));
    }

    #[test]
    fn test_grant_requires_privileges() {
        let manifest: Manifest = r#"
[connection]
resource_arn = "arn:cluster"
secret_arn = "arn:secret"

[grants.empty]
role = "app"
database = "app"
schema = "public"
object_type = "table"
"#
        .parse()
        .unwrap();
        assert!(format!("{:#}", manifest.decode().unwrap_err()).contains("at least one privilege"));
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let manifest: Manifest = r#"
[connection]
resource_arn = "arn:cluster"
secret_arn = "arn:secret"

[roles.a]
name = "app"

[roles.b]
name = "app"
"#
        .parse()
        .unwrap();
        let message = format!("{:#}", manifest.decode().unwrap_err());
        assert!(message.contains("role.b declares role app a second time"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pgconverge.toml");
        fs::write(&path, EXAMPLE).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.connection.endpoint.as_deref(), Some("http://localhost:8080"));
        assert!(Manifest::load(&dir.path().join("missing.toml")).is_err());
    }
}
