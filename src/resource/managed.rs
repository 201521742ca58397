//! Adapter from a [`Reconciler`] to a declarative [`Resource`]

use super::{Instance, Reconciler};
use crate::error::{self, FaultKind};
use crate::state::Ledger;
use anyhow::Result;
use dataapi::ErrorCategory;
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use equivalency::Comparator;
use log::warn;
use std::fmt;
use std::sync::Arc;

/// Fields compared as multisets when detecting drift
pub const UNORDERED_FIELDS: [&str; 2] = ["member_roles", "privileges"];

/// What applying a managed resource will do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Create,
    Update,
    Replace,
    Delete,
    Keep,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Keep => "keep",
        })
    }
}

/// A refreshed object paired with its desired configuration
///
/// `prior` is the refreshed remote instance (`None` when it does not exist)
/// and `desired` the manifest entry (`None` when it should be removed).
/// Every outcome of `apply`, including partial ones, is written to the
/// ledger.
#[derive(Debug)]
pub struct Managed<R: Reconciler> {
    address: String,
    reconciler: Arc<R>,
    prior: Option<Instance<R::Config>>,
    desired: Option<R::Config>,
    ledger: Ledger,
}

impl<R: Reconciler> Managed<R> {
    pub fn new(
        address: impl Into<String>,
        reconciler: Arc<R>,
        prior: Option<Instance<R::Config>>,
        desired: Option<R::Config>,
        ledger: Ledger,
    ) -> Self {
        Self {
            address: address.into(),
            reconciler,
            prior,
            desired,
            ledger,
        }
    }

    pub fn change(&self) -> Change {
        match (&self.prior, &self.desired) {
            (None, Some(_)) => Change::Create,
            (Some(_), None) => Change::Delete,
            (Some(prior), Some(desired)) if Self::needs_update(&prior.config, desired) => {
                if R::requires_replacement(&prior.config, desired) {
                    Change::Replace
                } else {
                    Change::Update
                }
            }
            _ => Change::Keep,
        }
    }

    fn needs_update(prior: &R::Config, desired: &R::Config) -> bool {
        drifted(&R::comparable(prior), &R::comparable(desired))
    }

    /// Write the outcome for this address: tracked instances are recorded,
    /// untracked ones forgotten
    fn persist(&self, instance: &Instance<R::Config>) -> Result<()> {
        match &instance.id {
            Some(id) => self
                .ledger
                .record(&self.address, R::KIND, id, &instance.config),
            None => {
                self.ledger.forget(&self.address);
                Ok(())
            }
        }
    }

    fn report(&self, outcome: error::Result<()>) -> Result<()> {
        if let Err(e) = &outcome {
            if e.kind() == FaultKind::PartialApply {
                warn!("{} was partially applied and is recorded as it stands", self.address);
            }
            if let Some(category) = e.category().filter(ErrorCategory::is_transient) {
                warn!("{}: {category}. {}", self.address, category.advice());
            }
        }
        Ok(outcome?)
    }

    fn create(&self, desired: &R::Config) -> Result<()> {
        let mut instance = Instance::new(desired.clone());
        let outcome = self.reconciler.create(&mut instance);
        self.persist(&instance)?;
        self.report(outcome)
    }

    fn update(&self, prior: &Instance<R::Config>, desired: &R::Config) -> Result<()> {
        let mut instance = prior.clone();
        let outcome = self.reconciler.update(&mut instance, desired);
        self.persist(&instance)?;
        self.report(outcome)
    }

    fn delete(&self, prior: &Instance<R::Config>) -> Result<()> {
        let mut instance = prior.clone();
        let outcome = self.reconciler.delete(&mut instance);
        self.persist(&instance)?;
        self.report(outcome)
    }
}

/// Whether `prior` and `desired` differ once key order, empty collections
/// and the order of unordered fields are ignored
pub fn drifted<C: serde::Serialize + PartialEq>(prior: &C, desired: &C) -> bool {
    if prior == desired {
        return false;
    }
    match (serde_json::to_value(prior), serde_json::to_value(desired)) {
        (Ok(prior), Ok(desired)) => {
            !Comparator::new(UNORDERED_FIELDS).equivalent_values(&desired, &prior)
        }
        _ => true,
    }
}

impl<R: Reconciler> Resource for Managed<R> {
    fn id(&self) -> String {
        self.address.clone()
    }

    fn description(&self) -> String {
        let config = self
            .desired
            .as_ref()
            .or_else(|| self.prior.as_ref().map(|p| &p.config));
        match config {
            Some(config) => format!("{} {} {}", self.change(), R::KIND, R::identity(config)),
            None => self.address.clone(),
        }
    }

    fn resource_type(&self) -> &'static str {
        R::KIND.resource_type()
    }

    fn current_state(&self) -> Result<ResourceState> {
        let Some(prior) = &self.prior else {
            return Ok(ResourceState::Absent);
        };
        Ok(match &self.desired {
            Some(desired) if Self::needs_update(&prior.config, desired) => ResourceState::Modified {
                from: R::summary(&prior.config),
                to: R::summary(desired),
            },
            Some(desired) => ResourceState::Present {
                details: Some(R::summary(desired)),
            },
            None => ResourceState::Present {
                details: Some(R::summary(&prior.config)),
            },
        })
    }

    fn desired_state(&self) -> ResourceState {
        match &self.desired {
            Some(desired) => ResourceState::Present {
                details: Some(R::summary(desired)),
            },
            None => ResourceState::Absent,
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.dry_run {
            return Ok(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            });
        }

        match (self.change(), &self.prior, &self.desired) {
            (Change::Create, _, Some(desired)) => {
                self.create(desired)?;
                Ok(ApplyResult::Created)
            }
            (Change::Update, Some(prior), Some(desired)) => {
                self.update(prior, desired)?;
                Ok(ApplyResult::Modified)
            }
            (Change::Replace, Some(prior), Some(desired)) => {
                self.delete(prior)?;
                self.create(desired)?;
                Ok(ApplyResult::Modified)
            }
            (Change::Delete, Some(prior), _) => {
                self.delete(prior)?;
                Ok(ApplyResult::Removed)
            }
            (Change::Keep, Some(prior), Some(desired)) => {
                if drifted(&prior.config, desired) {
                    warn!(
                        "{} differs in settings that are only set at creation; left unchanged",
                        self.address
                    );
                }
                Ok(ApplyResult::NoChange)
            }
            _ => Ok(ApplyResult::NoChange),
        }
    }

    fn can_parallelize(&self) -> bool {
        self.desired.as_ref().is_none_or(R::independent)
    }
}
