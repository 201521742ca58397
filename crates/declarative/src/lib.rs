//! # Declarative
//!
//! A framework for declarative resource management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging systems to match the desired state.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (a database, a role, a grant)
//! - **ResourceState**: The current or desired state of a resource
//! - **ExecutionPlan**: Ordered stages of resources; stages run one after another
//! - **Executor**: Applies each stage with bounded parallelism
//! - **KeyedLocks**: Serializes mutations that target the same external object
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     Resource, ResourceState, ApplyResult, ApplyContext,
//!     ExecutionPlan, ExecuteOptions, execute_simple,
//! };
//!
//! #[derive(Debug)]
//! struct Schema { name: String }
//!
//! impl Resource for Schema {
//!     fn id(&self) -> String { format!("schema.{}", self.name) }
//!     fn description(&self) -> String { format!("Schema {}", self.name) }
//!     fn resource_type(&self) -> &'static str { "schema" }
//!
//!     fn current_state(&self) -> ResourceState { ResourceState::Absent }
//!     fn desired_state(&self) -> ResourceState { ResourceState::Present { details: None } }
//!
//!     fn apply(&self, ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
//!         if ctx.dry_run {
//!             return Ok(ApplyResult::Skipped { reason: "Dry run".into() });
//!         }
//!         // CREATE SCHEMA ...
//!         Ok(ApplyResult::Created)
//!     }
//! }
//!
//! let mut plan = ExecutionPlan::new();
//! plan.push("schemas", Box::new(Schema { name: "reporting".into() }));
//!
//! let summary = execute_simple(plan, ExecuteOptions::default())?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks.

pub mod context;
pub mod diff;
pub mod executor;
pub mod locks;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use executor::{execute, execute_simple};
pub use locks::{KeyedLocks, LockGuard};
pub use planner::{ExecutionPlan, Stage};
pub use resource::{BoxedResource, Resource};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, Failure, ResourceState};
