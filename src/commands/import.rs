//! Adopt objects that already exist remotely

use anyhow::{Result, bail};
use std::collections::BTreeMap;

use super::Project;
use crate::Context;
use crate::resource::{Instance, ReadOutcome, Reconciler, ResourceKind};
use crate::state::Ledger;
use crate::ui;

pub fn run(ctx: &Context, address: &str) -> Result<()> {
    let project = Project::load(ctx)?;
    let id = import(&project, address)?;
    ui::success(&format!("Imported {address} ({id})"));
    Ok(())
}

/// Read the object declared at `address` and start tracking it
fn import(project: &Project, address: &str) -> Result<String> {
    let Some((kind, _)) = ResourceKind::parse_address(address) else {
        bail!("Invalid address {address:?}, expected database.<key>, role.<key> or grant.<key>");
    };
    if project.ledger.snapshot().get(address).is_some() {
        bail!("{address} is already managed");
    }

    let desired = &project.desired;
    let reconcilers = &project.reconcilers;
    let id = match kind {
        ResourceKind::Database => {
            adopt(reconcilers.databases.as_ref(), &desired.databases, address, &project.ledger)?
        }
        ResourceKind::Role => {
            adopt(reconcilers.roles.as_ref(), &desired.roles, address, &project.ledger)?
        }
        ResourceKind::Grant => {
            adopt(reconcilers.grants.as_ref(), &desired.grants, address, &project.ledger)?
        }
    };

    project.ledger.save()?;
    Ok(id)
}

fn adopt<R: Reconciler>(
    reconciler: &R,
    desired: &BTreeMap<String, R::Config>,
    address: &str,
    ledger: &Ledger,
) -> Result<String> {
    let Some(config) = desired.get(address) else {
        bail!("{address} is not declared in the manifest");
    };

    if !reconciler.exists(config)? {
        bail!("{} {} does not exist", R::KIND, R::identity(config));
    }

    let mut instance = Instance::new(config.clone());
    match reconciler.read(&mut instance)? {
        ReadOutcome::Found => {}
        ReadOutcome::NotFound => bail!("{} {} disappeared while importing", R::KIND, R::identity(config)),
        ReadOutcome::Ambiguous { rows } => {
            bail!("{} {} matched {rows} objects", R::KIND, R::identity(config))
        }
    }

    let Some(id) = instance.id.clone() else {
        bail!("{} {} has no identity after refresh", R::KIND, R::identity(config));
    };
    ledger.record(address, R::KIND, &id, &instance.config)?;
    Ok(id)
}
