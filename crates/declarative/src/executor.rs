//! Batch convergence - converges many roles with bounded parallelism

use crate::context::{ConfirmCallback, ExecutionContext, ProgressCallback};
use crate::engine::{absent, present};
use crate::error::Error;
use crate::role::RoleSpec;
use crate::types::{Action, ExecuteSummary, Mode, Report};
use anyhow::Result;
use log::error;
use rayon::prelude::*;
use std::collections::HashSet;

/// One declared role in a batch
#[derive(Debug, Clone)]
pub enum Desired {
    /// Role must exist as specified
    Present(RoleSpec),
    /// Role must not exist
    Absent(String),
}

impl Desired {
    /// Name of the role this entry is about
    pub fn name(&self) -> &str {
        match self {
            Self::Present(spec) => &spec.name,
            Self::Absent(name) => name,
        }
    }
}

/// Options for batch convergence
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of roles converged concurrently
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Reports of a batch, in declaration order, plus their summary
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub reports: Vec<Report>,
    pub summary: ExecuteSummary,
}

impl BatchOutcome {
    fn from_reports(reports: Vec<Report>) -> Self {
        let mut summary = ExecuteSummary::default();
        for report in &reports {
            summary.add_report(report);
        }
        Self { reports, summary }
    }
}

/// Converge a batch of roles
///
/// Names must be unique within the batch, since two convergences of the same
/// role must never run at once. In apply mode the batch is first previewed;
/// if anything would change, `confirm` is asked once, and declining returns
/// the preview untouched.
pub fn converge_all<P, C>(
    entries: &[Desired],
    ctx: &ExecutionContext<'_>,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<BatchOutcome>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    check_unique(entries)?;

    if entries.is_empty() {
        return Ok(BatchOutcome::default());
    }

    let preview_ctx = ctx.with_mode(Mode::DryRun);
    let preview = run_batch(entries, &preview_ctx, opts.jobs)?;

    let pending = preview
        .iter()
        .filter(|r| r.action.is_change() && !r.is_failure())
        .count();

    if ctx.dry_run() || pending == 0 {
        report_all(&preview, ctx.mode, progress);
        return Ok(BatchOutcome::from_reports(preview));
    }

    let prompt = format!("Apply {pending} {} change(s)?", ctx.kind);
    if !confirm.confirm(&prompt)? {
        report_all(&preview, Mode::DryRun, progress);
        return Ok(BatchOutcome::from_reports(preview));
    }

    progress.on_batch_start(entries.len(), ctx.mode);
    let reports = if opts.jobs <= 1 || entries.len() == 1 {
        // Sequential execution with live progress
        let mut reports = Vec::with_capacity(entries.len());
        for entry in entries {
            progress.on_role_start(entry.name());
            let report = converge_one(entry, ctx);
            progress.on_role_complete(&report);
            reports.push(report);
        }
        reports
    } else {
        // The progress callback is not thread-safe, report after
        let reports = run_batch(entries, ctx, opts.jobs)?;
        for report in &reports {
            progress.on_role_complete(report);
        }
        reports
    };
    progress.on_batch_complete();

    Ok(BatchOutcome::from_reports(reports))
}

/// Converge a single entry, turning a query failure into a failed report
fn converge_one(entry: &Desired, ctx: &ExecutionContext<'_>) -> Report {
    let outcome = match entry {
        Desired::Present(spec) => present(spec, ctx),
        Desired::Absent(name) => absent(name, ctx),
    };

    outcome.unwrap_or_else(|e| {
        error!("{e:#}");
        Report::new(entry.name(), Action::NoOp).failed(format!("{e:#}"))
    })
}

/// Converge entries on a rayon pool, keeping declaration order
fn run_batch(entries: &[Desired], ctx: &ExecutionContext<'_>, jobs: usize) -> Result<Vec<Report>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    Ok(pool.install(|| entries.par_iter().map(|entry| converge_one(entry, ctx)).collect()))
}

fn report_all<P: ProgressCallback>(reports: &[Report], mode: Mode, progress: &mut P) {
    progress.on_batch_start(reports.len(), mode);
    for report in reports {
        progress.on_role_complete(report);
    }
    progress.on_batch_complete();
}

fn check_unique(entries: &[Desired]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.name().is_empty() {
            return Err(Error::EmptyName.into());
        }
        if !seen.insert(entry.name()) {
            return Err(Error::DuplicateRole(entry.name().to_string()).into());
        }
    }
    Ok(())
}
