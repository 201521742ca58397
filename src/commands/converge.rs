//! Declarative commands
//!
//! - `plan` - Preview what apply would change
//! - `apply` - Make the remote catalogs match the manifest
//! - `destroy` - Remove everything the state file tracks
//! - `status` - Show each object and whether it matches

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{ExecuteSummary, ResourceState};
use std::collections::BTreeMap;

use super::Project;
use crate::Context;
use crate::engine::differ::{display_diff, plan_diffs};
use crate::engine::{self, ApplyOptions};
use crate::ui;

// ============================================================================
// Plan
// ============================================================================

pub fn plan(ctx: &Context, target: Option<&str>) -> Result<()> {
    let project = Project::load(ctx)?;
    let plan = project.plan(target)?;
    display_diff(&plan_diffs(&plan));
    Ok(())
}

// ============================================================================
// Apply / Destroy
// ============================================================================

pub fn apply(ctx: &Context, target: Option<&str>, opts: &ApplyOptions) -> Result<()> {
    let project = Project::load(ctx)?;
    let summary = apply_project(&project, target, opts)?;
    ensure_success(&summary)
}

pub fn destroy(ctx: &Context, target: Option<&str>, opts: &ApplyOptions) -> Result<()> {
    let project = Project::load(ctx)?;
    let summary = destroy_project(&project, target, opts)?;
    ensure_success(&summary)
}

fn apply_project(
    project: &Project,
    target: Option<&str>,
    opts: &ApplyOptions,
) -> Result<ExecuteSummary> {
    let plan = project.plan(target)?;
    engine::apply(plan, opts, &project.ledger)
}

fn destroy_project(
    project: &Project,
    target: Option<&str>,
    opts: &ApplyOptions,
) -> Result<ExecuteSummary> {
    let plan = project.plan_destroy(target)?;
    if plan.is_empty() {
        ui::info("Nothing to destroy");
        return Ok(ExecuteSummary::default());
    }
    engine::apply(plan, opts, &project.ledger)
}

fn ensure_success(summary: &ExecuteSummary) -> Result<()> {
    if summary.is_success() {
        Ok(())
    } else {
        bail!("{} of {} changes failed", summary.failed, summary.total())
    }
}

// ============================================================================
// Status
// ============================================================================

/// How an object compares with the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    InSync,
    Missing,
    Drifted,
    Unmanaged,
    Unknown,
}

impl Standing {
    fn of(current: &ResourceState, desired: &ResourceState) -> Self {
        match (current, desired) {
            (ResourceState::Unknown, _) => Self::Unknown,
            (ResourceState::Modified { .. }, _) => Self::Drifted,
            (ResourceState::Absent, ResourceState::Present { .. }) => Self::Missing,
            (_, ResourceState::Absent) => Self::Unmanaged,
            _ => Self::InSync,
        }
    }

    fn render(self) -> colored::ColoredString {
        match self {
            Self::InSync => "✓".green(),
            Self::Missing => "✗".red(),
            Self::Drifted => "~".yellow(),
            Self::Unmanaged => "-".red(),
            Self::Unknown => "?".dimmed(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::InSync => "in sync",
            Self::Missing => "missing",
            Self::Drifted => "drifted",
            Self::Unmanaged => "not in manifest",
            Self::Unknown => "unknown",
        }
    }
}

pub fn status(ctx: &Context, target: Option<&str>) -> Result<()> {
    let project = Project::load(ctx)?;
    let rows = status_rows(&project, target)?;

    ui::header("pgconverge status");
    ui::kv(
        "State",
        &ui::truncate_end(&project.state_path().display().to_string(), 60),
    );
    ui::kv("Tracked", &project.ledger.snapshot().len().to_string());

    let mut by_type: BTreeMap<&str, Vec<&StatusRow>> = BTreeMap::new();
    for row in &rows {
        by_type.entry(row.resource_type).or_default().push(row);
    }

    for (resource_type, rows) in by_type {
        ui::section(resource_type.trim_start_matches("postgres_"));
        for row in rows {
            println!(
                "  {} {:<30} {}",
                row.standing.render(),
                row.address,
                row.standing.label().dimmed()
            );
            if ctx.verbose > 0
                && let Some(details) = &row.details
            {
                ui::dim(&format!("    {details}"));
            }
        }
    }

    let out_of_sync = rows.iter().filter(|r| r.standing != Standing::InSync).count();
    println!();
    if out_of_sync == 0 {
        ui::success("Everything matches the manifest");
    } else {
        ui::warn(&format!("{out_of_sync} object(s) out of sync, run `pgconverge plan`"));
    }
    Ok(())
}

struct StatusRow {
    address: String,
    resource_type: &'static str,
    standing: Standing,
    details: Option<String>,
}

fn status_rows(project: &Project, target: Option<&str>) -> Result<Vec<StatusRow>> {
    let plan = project.plan(target)?;
    let mut rows = Vec::new();
    for resource in plan.resources() {
        let current = resource
            .current_state()
            .unwrap_or(ResourceState::Unknown);
        let desired = resource.desired_state();
        let details = match &current {
            ResourceState::Present { details } => details.clone(),
            ResourceState::Modified { from, to } => Some(format!("{from} → {to}")),
            _ => None,
        };
        rows.push(StatusRow {
            address: resource.id(),
            resource_type: resource.resource_type(),
            standing: Standing::of(&current, &desired),
            details,
        });
    }
    rows.sort_by(|a, b| a.address.cmp(&b.address));
    Ok(rows)
}
