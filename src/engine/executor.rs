//! Apply a plan with terminal output

use anyhow::Result;
use colored::Colorize;
use declarative::{
    ApplyResult, ConfirmCallback, ExecuteOptions, ExecuteSummary, ExecutionPlan, ProgressCallback,
};
use indicatif::ProgressBar;
use log::error;

use super::differ::{display_diff, plan_diffs};
use crate::progress;
use crate::state::Ledger;

/// Options for `apply` and `destroy`
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Show the plan without making changes
    pub dry_run: bool,
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Objects applied concurrently within a stage
    pub jobs: usize,
    pub verbose: bool,
    /// Skip the remaining stages once one has a failure
    pub stop_on_failure: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            yes: false,
            jobs: 4,
            verbose: false,
            stop_on_failure: true,
        }
    }
}

impl From<&ApplyOptions> for ExecuteOptions {
    fn from(opts: &ApplyOptions) -> Self {
        Self {
            dry_run: opts.dry_run,
            jobs: opts.jobs.max(1),
            verbose: opts.verbose,
            stop_on_failure: opts.stop_on_failure,
        }
    }
}

/// Asks on the terminal unless `--yes` was given
struct TerminalConfirm {
    yes: bool,
}

impl ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        println!();
        Ok(dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?)
    }
}

/// One bar per stage; the ledger is saved whenever a stage completes
struct StageProgress {
    bar: Option<ProgressBar>,
    ledger: Ledger,
}

impl ProgressCallback for StageProgress {
    fn on_stage_start(&mut self, stage: &str, count: usize) {
        self.bar = Some(progress::bar(count as u64, stage));
    }

    fn on_resource_start(&mut self, id: &str, _description: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(id.to_string());
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        let symbol = match result {
            ApplyResult::NoChange => "○",
            ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓",
            ApplyResult::Failed { .. } => "✗",
            ApplyResult::Skipped { .. } => "⊘",
        };
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{symbol} {id}"));
            bar.inc(1);
        }
    }

    fn on_stage_complete(&mut self, stage: &str) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        println!("  {} {}", "✓".green(), stage);
        if let Err(e) = self.ledger.save() {
            error!("could not save state after stage {stage}: {e:#}");
        }
    }
}

/// Show the plan, confirm and apply it
///
/// The ledger is written after each stage and once more at the end, so
/// partial progress survives a failure or an interrupt.
pub fn apply(plan: ExecutionPlan, opts: &ApplyOptions, ledger: &Ledger) -> Result<ExecuteSummary> {
    let diffs = plan_diffs(&plan);
    display_diff(&diffs);

    if diffs.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary {
            skipped: diffs.len(),
            ..Default::default()
        });
    }

    let mut progress = StageProgress {
        bar: None,
        ledger: ledger.clone(),
    };
    let mut confirm = TerminalConfirm { yes: opts.yes };

    let summary = declarative::execute(plan, opts.into(), &mut progress, &mut confirm)?;
    if summary.total() == summary.skipped {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(summary);
    }

    ledger.save()?;
    print_summary(&summary);
    Ok(summary)
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Converged", "✓".green().bold());
    } else {
        println!("  {} Applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
        for failure in &summary.failures {
            println!("      {} {}: {}", "✗".red(), failure.resource_id, failure.error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConvergeState;
    use tempfile::TempDir;

    #[test]
    fn test_options_map_to_execute_options() {
        let opts = ApplyOptions {
            jobs: 0,
            ..Default::default()
        };
        let execute: ExecuteOptions = (&opts).into();
        assert_eq!(execute.jobs, 1);
        assert!(execute.stop_on_failure);
        assert!(!execute.dry_run);
    }

    #[test]
    fn test_yes_skips_prompt() {
        let mut confirm = TerminalConfirm { yes: true };
        assert!(confirm.confirm("Apply changes?").unwrap());
    }

    #[test]
    fn test_stage_completion_saves_ledger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("pgconverge.state.toml");
        let ledger = Ledger::new(ConvergeState::default(), path.clone());

        let mut progress = StageProgress {
            bar: None,
            ledger,
        };
        progress.on_stage_start("roles", 1);
        progress.on_resource_complete("role.app", &ApplyResult::Created);
        progress.on_stage_complete("roles");

        assert!(path.exists());
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_empty_plan_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pgconverge.state.toml");
        let ledger = Ledger::new(ConvergeState::default(), path.clone());

        let summary = apply(ExecutionPlan::new(), &ApplyOptions::default(), &ledger).unwrap();
        assert_eq!(summary.total(), 0);
        assert!(!path.exists());
    }
}
