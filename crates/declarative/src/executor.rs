//! Execution engine - applies plan stages in order, each with bounded parallelism

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::diff::compute_diffs;
use crate::planner::{ExecutionPlan, Stage};
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use log::{debug, warn};
use rayon::prelude::*;
use std::sync::Mutex;

/// Execute a plan with the given options and callbacks
///
/// Stages run in plan order. Within a stage, parallelizable resources are
/// applied on a pool of `opts.jobs` threads, then the remaining resources
/// run one at a time.
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options (dry_run, jobs, verbose, stop_on_failure)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let total_changes: usize = plan
        .stages
        .iter()
        .map(|stage| compute_diffs(&stage.resources).len())
        .sum();

    if total_changes == 0 {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        return Ok(ExecuteSummary {
            skipped: total_changes,
            ..Default::default()
        });
    }

    if !confirm.confirm("Apply changes?")? {
        return Ok(ExecuteSummary {
            skipped: total_changes,
            ..Default::default()
        });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {e}"))?;

    let mut summary = ExecuteSummary::default();
    let mut stages = plan.stages.into_iter();

    for stage in stages.by_ref() {
        if stage.resources.is_empty() {
            continue;
        }
        debug!(
            "stage {}: {} resource(s)",
            stage.name,
            stage.resources.len()
        );
        progress.on_stage_start(&stage.name, stage.resources.len());
        let stage_summary = execute_stage(&pool, &stage, opts.verbose, progress);
        progress.on_stage_complete(&stage.name);

        let failed = !stage_summary.is_success();
        summary.merge(&stage_summary);

        if failed && opts.stop_on_failure {
            warn!("stage {} failed, skipping the remaining stages", stage.name);
            break;
        }
    }

    for stage in stages {
        summary.skipped += stage.resources.len();
    }

    Ok(summary)
}

/// Execute one stage
fn execute_stage<P: ProgressCallback>(
    pool: &rayon::ThreadPool,
    stage: &Stage,
    verbose: bool,
    progress: &mut P,
) -> ExecuteSummary {
    let (parallel, sequential): (Vec<&dyn Resource>, Vec<&dyn Resource>) = stage
        .resources
        .iter()
        .map(|r| &**r)
        .partition(|r| r.can_parallelize());

    let mut summary = ExecuteSummary::default();

    if parallel.len() > 1 && pool.current_num_threads() > 1 {
        // The progress callback is not thread-safe, so results are reported after the batch.
        let results: Mutex<Vec<(String, ApplyResult)>> = Mutex::new(Vec::new());

        pool.install(|| {
            parallel.par_iter().for_each(|resource| {
                let result = apply_resource(*resource, verbose);
                let mut guard = match results.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.push((resource.id(), result));
            });
        });

        let results = match results.into_inner() {
            Ok(results) => results,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (id, result) in &results {
            progress.on_resource_complete(id, result);
            summary.record(id, result);
        }
    } else {
        run_sequential(&parallel, verbose, progress, &mut summary);
    }

    run_sequential(&sequential, verbose, progress, &mut summary);
    summary
}

fn run_sequential<P: ProgressCallback>(
    resources: &[&dyn Resource],
    verbose: bool,
    progress: &mut P,
    summary: &mut ExecuteSummary,
) {
    for resource in resources {
        let id = resource.id();
        progress.on_resource_start(&id, &resource.description());
        let result = apply_resource(*resource, verbose);
        progress.on_resource_complete(&id, &result);
        summary.record(&id, &result);
    }
}

/// Apply a single resource
fn apply_resource(resource: &dyn Resource, verbose: bool) -> ApplyResult {
    let mut ctx = ApplyContext::new(false, verbose);

    match resource.apply(&mut ctx) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: format!("{e:#}"),
        },
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(plan: ExecutionPlan, opts: ExecuteOptions) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}
