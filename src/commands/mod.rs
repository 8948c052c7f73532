//! Command implementations. Each returns whether every role converged.

pub mod apply;
pub mod hash;
pub mod role;

use anyhow::{Context as AnyhowContext, Result};
use declarative::RoleKind;
use pgkit::PsqlBackend;

use crate::Context;
use crate::config::Settings;
use crate::ui;
use declarative::Report;

/// Build the psql backend for one kind of role.
pub fn backend(settings: &Settings, kind: RoleKind) -> Result<PsqlBackend> {
    let backend = PsqlBackend::new(settings.connection.clone())
        .context("Could not set up the PostgreSQL client")?
        .with_retry(settings.retry.to_config())
        .for_kind(kind);
    log::debug!("Using {backend:?}");
    Ok(backend)
}

/// Print a report the way the run asked for.
pub fn show(ctx: &Context, report: &Report) {
    if ctx.json {
        ui::report_json(report);
    } else if !ctx.quiet || report.is_failure() {
        ui::report(report);
    }
}
