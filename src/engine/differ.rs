//! Plan rendering

use colored::Colorize;
use declarative::{DiffSummary, ExecutionPlan, ResourceDiff, ResourceState, compute_diffs, group_by_type};
use similar::{ChangeTag, TextDiff};

/// Diffs of every resource in the plan, in stage order
pub fn plan_diffs(plan: &ExecutionPlan) -> Vec<ResourceDiff> {
    plan.stages
        .iter()
        .flat_map(|stage| compute_diffs(&stage.resources))
        .collect()
}

fn type_title(resource_type: &str) -> &str {
    match resource_type {
        "postgres_database" => "Databases",
        "postgres_role" => "Roles",
        "postgres_grant" => "Grants",
        other => other,
    }
}

/// Word level rendering of a drifted setting
///
/// Removed words are shown red and struck through, added ones green.
pub fn inline_change(from: &str, to: &str) -> String {
    let diff = TextDiff::from_words(from, to);
    diff.iter_all_changes()
        .map(|change| {
            let value = change.value();
            match change.tag() {
                ChangeTag::Delete => value.red().strikethrough().to_string(),
                ChangeTag::Insert => value.green().to_string(),
                ChangeTag::Equal => value.to_string(),
            }
        })
        .collect()
}

fn symbol(diff: &ResourceDiff) -> colored::ColoredString {
    if diff.current == ResourceState::Unknown {
        "?".dimmed()
    } else if diff.is_addition() {
        "+".green()
    } else if diff.is_removal() {
        "-".red()
    } else {
        "~".yellow()
    }
}

fn detail(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, ResourceState::Present { details }) => details.clone().unwrap_or_default(),
        (ResourceState::Present { details }, ResourceState::Absent) => details.clone().unwrap_or_default(),
        (ResourceState::Modified { from, to }, _) => inline_change(from, to),
        (ResourceState::Unknown, _) => "(state unknown)".to_string(),
        _ => String::new(),
    }
}

/// Display a list of diffs grouped by object kind
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", "Plan".bold());
    println!("│");

    for (resource_type, type_diffs) in group_by_type(diffs) {
        println!("│ {}", type_title(&resource_type).bold());
        for diff in type_diffs {
            println!(
                "│   {} {:<30} {}",
                symbol(diff),
                diff.description,
                detail(diff).dimmed()
            );
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to add, {} to change, {} to destroy",
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Line diff of two documents, indented
pub fn text_diff(old: &str, new: &str) -> Vec<String> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter_map(|change| {
            let line = change.value().trim_end_matches('\n');
            match change.tag() {
                ChangeTag::Delete => Some(format!("    {}", format!("- {line}").red())),
                ChangeTag::Insert => Some(format!("    {}", format!("+ {line}").green())),
                ChangeTag::Equal => None,
            }
        })
        .collect()
}
