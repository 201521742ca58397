//! Refresh and planning
//!
//! Every tracked object is re-read from the catalogs, then paired with its
//! manifest entry and placed in a stage. Stages run in this order:
//!
//! 1. revoke grants
//! 2. drop databases
//! 3. drop roles
//! 4. roles
//! 5. databases
//! 6. grants

use crate::resource::{
    Change, Instance, Managed, ReadOutcome, Reconciler, Reconcilers, ResourceKind,
};
use crate::schema::DesiredState;
use crate::state::{ConvergeState, Ledger};
use anyhow::{Context, Result};
use declarative::ExecutionPlan;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const REVOKE_GRANTS: &str = "revoke grants";
pub const DROP_DATABASES: &str = "drop databases";
pub const DROP_ROLES: &str = "drop roles";
pub const ROLES: &str = "roles";
pub const DATABASES: &str = "databases";
pub const GRANTS: &str = "grants";

/// Stage an object of `kind` goes to for `change`
pub fn stage_for(kind: ResourceKind, change: Change) -> &'static str {
    match (kind, change) {
        (ResourceKind::Grant, Change::Delete) => REVOKE_GRANTS,
        (ResourceKind::Database, Change::Delete) => DROP_DATABASES,
        (ResourceKind::Role, Change::Delete) => DROP_ROLES,
        (ResourceKind::Role, _) => ROLES,
        (ResourceKind::Database, _) => DATABASES,
        (ResourceKind::Grant, _) => GRANTS,
    }
}

/// One address after refresh
#[derive(Debug)]
pub struct Refreshed<C> {
    pub address: String,
    /// Remote instance, `None` when missing or never created
    pub prior: Option<Instance<C>>,
    pub desired: Option<C>,
    /// Whether the state file had a record for this address
    pub tracked: bool,
}

/// Re-read every address of one kind, tracked or desired, in parallel
pub fn refresh<R: Reconciler>(
    reconciler: &R,
    state: &ConvergeState,
    desired: &BTreeMap<String, R::Config>,
) -> Result<Vec<Refreshed<R::Config>>> {
    let addresses: BTreeSet<&str> = desired
        .keys()
        .map(String::as_str)
        .chain(state.addresses(R::KIND))
        .collect();

    addresses
        .into_par_iter()
        .map(|address| -> Result<Refreshed<R::Config>> {
            let tracked = state.instance::<R::Config>(address)?;
            let was_tracked = tracked.is_some();
            let prior = match tracked {
                Some(instance) => read_prior(reconciler, address, instance)?,
                None => None,
            };
            Ok(Refreshed {
                address: address.to_string(),
                prior,
                desired: desired.get(address).cloned(),
                tracked: was_tracked,
            })
        })
        .collect()
}

fn read_prior<R: Reconciler>(
    reconciler: &R,
    address: &str,
    mut instance: Instance<R::Config>,
) -> Result<Option<Instance<R::Config>>> {
    let outcome = reconciler
        .read(&mut instance)
        .with_context(|| format!("Failed to refresh {address}"))?;
    match outcome {
        ReadOutcome::Found => {
            debug!("refreshed {address}");
            Ok(Some(instance))
        }
        ReadOutcome::NotFound => {
            warn!("{address} no longer exists remotely");
            Ok(None)
        }
        ReadOutcome::Ambiguous { rows } => {
            warn!("{address} matched {rows} objects remotely, treating it as missing");
            Ok(None)
        }
    }
}

/// Refresh everything and build the staged plan
///
/// Tracked objects that vanished remotely and are no longer desired are
/// dropped from the ledger; nothing is written to disk here.
pub fn build(
    reconcilers: &Reconcilers,
    desired: &DesiredState,
    ledger: &Ledger,
) -> Result<ExecutionPlan> {
    let state = ledger.snapshot();
    let mut plan = ExecutionPlan::new();

    let (roles, (databases, grants)) = rayon::join(
        || refresh(reconcilers.roles.as_ref(), &state, &desired.roles),
        || {
            rayon::join(
                || refresh(reconcilers.databases.as_ref(), &state, &desired.databases),
                || refresh(reconcilers.grants.as_ref(), &state, &desired.grants),
            )
        },
    );

    stage(&mut plan, &reconcilers.roles, roles?, ledger);
    stage(&mut plan, &reconcilers.databases, databases?, ledger);
    stage(&mut plan, &reconcilers.grants, grants?, ledger);

    order_stages(&mut plan);
    Ok(plan)
}

fn stage<R: Reconciler>(
    plan: &mut ExecutionPlan,
    reconciler: &Arc<R>,
    refreshed: Vec<Refreshed<R::Config>>,
    ledger: &Ledger,
) {
    for entry in refreshed {
        if entry.prior.is_none() && entry.desired.is_none() {
            if entry.tracked {
                info!("forgetting {}: gone remotely", entry.address);
                ledger.forget(&entry.address);
            }
            continue;
        }

        let managed = Managed::new(
            entry.address,
            Arc::clone(reconciler),
            entry.prior,
            entry.desired,
            ledger.clone(),
        );
        let stage = stage_for(R::KIND, managed.change());
        plan.push(stage, Box::new(managed));
    }
}

/// Reorder stages to the fixed execution order
fn order_stages(plan: &mut ExecutionPlan) {
    const ORDER: [&str; 6] = [REVOKE_GRANTS, DROP_DATABASES, DROP_ROLES, ROLES, DATABASES, GRANTS];
    plan.stages
        .sort_by_key(|stage| ORDER.iter().position(|name| *name == stage.name));
}
