pub mod converge;
pub mod equivalent;
pub mod import;

use anyhow::{Context as AnyhowContext, Result};
use dataapi::{HttpExecutor, StatementExecutor};
use declarative::{ExecutionPlan, KeyedLocks};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Context;
use crate::config;
use crate::engine::planner;
use crate::progress;
use crate::resource::Reconcilers;
use crate::schema::{DesiredState, Manifest};
use crate::session::Session;
use crate::state::{ConvergeState, Ledger};

/// Manifest, state and connection for one invocation
pub struct Project {
    pub desired: DesiredState,
    pub reconcilers: Reconcilers,
    pub ledger: Ledger,
    quiet: bool,
}

impl Project {
    /// Resolve paths and endpoint from the command line and load everything
    pub fn load(ctx: &Context) -> Result<Self> {
        let manifest_path = config::manifest_path(ctx.manifest.as_deref())?;
        let manifest = Manifest::load(&manifest_path)?;
        let endpoint = config::endpoint(
            ctx.endpoint.as_deref(),
            manifest.connection.endpoint.as_deref(),
        )?;
        let state_path = config::state_path(ctx.state.as_deref(), &manifest_path);

        debug!("manifest {}", manifest_path.display());
        debug!("state {}", state_path.display());
        debug!("endpoint {endpoint}");

        let mut project = Self::open(
            &manifest,
            state_path,
            Arc::new(HttpExecutor::new(endpoint)),
        )?;
        project.quiet = ctx.quiet;
        if project.desired.is_empty() {
            log::warn!("{} declares no objects", manifest_path.display());
        }
        Ok(project)
    }

    /// Build a project on top of any executor
    pub fn open(
        manifest: &Manifest,
        state_path: PathBuf,
        executor: Arc<dyn StatementExecutor>,
    ) -> Result<Self> {
        let desired = manifest.decode()?;
        let state = ConvergeState::load(&state_path)?;
        let session = Session::new(executor, Arc::new(KeyedLocks::new()));

        Ok(Self {
            desired,
            reconcilers: Reconcilers::new(&session),
            ledger: Ledger::new(state, state_path),
            quiet: true,
        })
    }

    pub fn state_path(&self) -> &Path {
        self.ledger.path()
    }

    /// Refresh and plan toward the manifest
    pub fn plan(&self, target: Option<&str>) -> Result<ExecutionPlan> {
        self.plan_toward(&self.desired, target)
    }

    /// Refresh and plan the removal of everything tracked
    pub fn plan_destroy(&self, target: Option<&str>) -> Result<ExecutionPlan> {
        self.plan_toward(&DesiredState::default(), target)
    }

    fn plan_toward(&self, desired: &DesiredState, target: Option<&str>) -> Result<ExecutionPlan> {
        let spinner = (!self.quiet).then(|| progress::spinner("Refreshing remote state..."));
        let plan = planner::build(&self.reconcilers, desired, &self.ledger);
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        Ok(plan
            .context("Could not refresh remote state")?
            .filter_by_target(target))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use dataapi::ScriptedExecutor;
    use tempfile::TempDir;

    pub const MANIFEST: &str = r#"
[connection]
resource_arn = "arn:cluster"
secret_arn = "arn:secret"

[roles.app]
name = "app"
login = true

[databases.app]
name = "app"
owner = "app"

[grants.app_tables]
role = "app"
database = "app"
schema = "public"
object_type = "table"
privileges = ["SELECT", "INSERT"]
"#;

    /// Project over a scripted executor with its state in a temp dir
    pub fn project(manifest: &str) -> (Project, ScriptedExecutor, TempDir) {
        let dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new();
        let manifest: Manifest = manifest.parse().unwrap();
        let project = Project::open(
            &manifest,
            dir.path().join("pgconverge.state.toml"),
            Arc::new(executor.clone()),
        )
        .unwrap();
        (project, executor, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MANIFEST, project};

    #[test]
    fn test_open_decodes_manifest() {
        let (project, _executor, _dir) = project(MANIFEST);
        assert_eq!(project.desired.len(), 3);
        assert!(project.ledger.snapshot().is_empty());
        assert!(project.state_path().ends_with("pgconverge.state.toml"));
    }

    #[test]
    fn test_plan_filters_by_target() {
        let (project, _executor, _dir) = project(MANIFEST);
        let plan = project.plan(Some("roles")).unwrap();
        assert_eq!(plan.total_resources(), 1);
        assert_eq!(project.plan(None).unwrap().total_resources(), 3);
    }

    #[test]
    fn test_destroy_plan_without_state_is_empty() {
        let (project, _executor, _dir) = project(MANIFEST);
        assert!(project.plan_destroy(None).unwrap().is_empty());
    }
}
