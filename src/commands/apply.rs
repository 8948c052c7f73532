//! Manifest convergence: `rolesync apply` and `rolesync plan`.

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{
    ConfirmCallback, ExecuteOptions, ExecuteSummary, ExecutionContext, Mode, ProgressCallback,
    Report, RoleKind, converge_all,
};

use super::{backend, show};
use crate::Context;
use crate::cli::ManifestArgs;
use crate::config::{Manifest, Settings};
use crate::ui;

/// Prints each report as its role completes
struct ReportPrinter<'a> {
    ctx: &'a Context,
    kind: RoleKind,
}

impl ProgressCallback for ReportPrinter<'_> {
    fn on_batch_start(&mut self, count: usize, mode: Mode) {
        if self.ctx.json || self.ctx.quiet {
            return;
        }
        let verb = if mode.is_dry_run() { "Planning" } else { "Converging" };
        ui::section(&format!("{verb} {count} {}(s)", self.kind));
    }

    fn on_role_start(&mut self, name: &str) {
        log::debug!("Converging {} {name}", self.kind);
    }

    fn on_role_complete(&mut self, report: &Report) {
        show(self.ctx, report);
    }

    fn on_batch_complete(&mut self) {}
}

/// Asks on the terminal unless `--yes` was given
struct PromptConfirm {
    assume_yes: bool,
    /// JSON output has no terminal to ask on
    non_interactive: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        if self.non_interactive {
            bail!("--json needs --yes to apply changes");
        }

        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;

        if !confirmed {
            println!();
            println!("  {} Aborted, showing the plan instead", "✗".red());
        }
        Ok(confirmed)
    }
}

pub fn apply(ctx: &Context, args: &ManifestArgs, dry_run: bool, yes: bool) -> Result<bool> {
    converge_manifest(ctx, args, Mode::from_dry_run(dry_run), yes)
}

pub fn plan(ctx: &Context, args: &ManifestArgs) -> Result<bool> {
    converge_manifest(ctx, args, Mode::DryRun, true)
}

fn converge_manifest(ctx: &Context, args: &ManifestArgs, mode: Mode, yes: bool) -> Result<bool> {
    let settings = Settings::load(ctx.config.as_deref())?;
    let manifest = Manifest::load(&args.manifest)?;

    let unknown = manifest.unknown(&args.only);
    if !unknown.is_empty() {
        bail!(
            "Not declared in {}: {}",
            args.manifest.display(),
            unknown.join(", ")
        );
    }

    let opts = ExecuteOptions {
        jobs: args.jobs.unwrap_or(settings.defaults.jobs).max(1),
    };
    let mut total = ExecuteSummary::default();

    // Groups first so users can join groups declared alongside them
    for kind in [RoleKind::Group, RoleKind::User] {
        let entries = manifest.entries(kind, &args.only);
        if entries.is_empty() {
            continue;
        }

        let backend = backend(&settings, kind)?;
        let exec = ExecutionContext::new(&backend, mode)
            .with_default_encoding(settings.defaults.encoding)
            .with_kind(kind);

        let mut progress = ReportPrinter { ctx, kind };
        let mut confirm = PromptConfirm {
            assume_yes: yes,
            non_interactive: ctx.json,
        };
        let outcome = converge_all(&entries, &exec, &opts, &mut progress, &mut confirm)?;
        total.merge(&outcome.summary);
    }

    if total.total() == 0 {
        if !ctx.json {
            ui::info("Nothing declared");
        }
        return Ok(true);
    }

    if !ctx.json && !ctx.quiet {
        ui::summary(&total);
    }
    Ok(total.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_assume_yes() {
        let mut confirm = PromptConfirm {
            assume_yes: true,
            non_interactive: true,
        };
        assert!(confirm.confirm("Apply?").unwrap());
    }

    #[test]
    fn test_confirm_json_without_yes_refuses() {
        let mut confirm = PromptConfirm {
            assume_yes: false,
            non_interactive: true,
        };
        let err = confirm.confirm("Apply?").unwrap_err();
        assert!(err.to_string().contains("--yes"));
    }
}
