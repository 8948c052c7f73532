//! Convergence engine
//!
//! Decisions are pure functions of the canonical spec and the observed
//! state. Rendering a decision into a [`Report`] is the only place that
//! touches the store's mutating half, and only outside dry-run mode.

use crate::context::ExecutionContext;
use crate::credential::resolve;
use crate::diff::diff;
use crate::role::{CanonicalRole, ObservedRole, RoleAttributes, RoleSpec};
use crate::types::{Action, Ensure, Report};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::Value;

/// What has to happen to a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Already converged
    NoOp,
    /// Create with every specified attribute
    Create(RoleAttributes),
    /// Change only the listed attributes
    Update(RoleAttributes),
    /// Drop the role
    Remove,
}

impl Decision {
    /// Decision class, without the attribute payload
    pub fn action(&self) -> Action {
        match self {
            Self::NoOp => Action::NoOp,
            Self::Create(_) => Action::Create,
            Self::Update(_) => Action::Update,
            Self::Remove => Action::Remove,
        }
    }
}

/// Decide how to make a role present
pub fn decide_present(
    desired: &CanonicalRole,
    observed: Option<&ObservedRole>,
    force_refresh: bool,
) -> Decision {
    let Some(observed) = observed else {
        return Decision::Create(desired.attributes.clone());
    };

    let changes = diff(desired, observed, force_refresh);
    if changes.is_empty() {
        Decision::NoOp
    } else {
        Decision::Update(changes)
    }
}

/// Decide how to make a role absent
pub fn decide_absent(observed_exists: bool) -> Decision {
    if observed_exists {
        Decision::Remove
    } else {
        Decision::NoOp
    }
}

/// Converge a role towards `spec`
///
/// The store is queried exactly once. A query failure is returned as an
/// error; a failed mutation becomes a report with `result = false`.
pub fn present(spec: &RoleSpec, ctx: &ExecutionContext<'_>) -> Result<Report> {
    let desired = resolve(spec, ctx.default_encoding);

    // A refresh rewrites the credential regardless, so the stored hash is
    // not worth reading (and may not be readable at all).
    let observed = ctx
        .store
        .query(&spec.name, !desired.refresh_credential)
        .with_context(|| format!("failed to query {} {}", ctx.kind, spec.name))?;

    let decision = decide_present(&desired, observed.as_ref(), desired.refresh_credential);
    debug!("{} {}: {:?}", ctx.kind, spec.name, decision);

    Ok(render(&spec.name, Ensure::Present, decision, ctx))
}

/// Converge a role towards not existing
pub fn absent(name: &str, ctx: &ExecutionContext<'_>) -> Result<Report> {
    let exists = ctx
        .store
        .exists(name)
        .with_context(|| format!("failed to query {} {name}", ctx.kind))?;

    let decision = decide_absent(exists);
    debug!("{} {name}: {:?}", ctx.kind, decision);

    Ok(render(name, Ensure::Absent, decision, ctx))
}

/// Turn a decision into a report, mutating the store unless in dry-run mode
fn render(
    name: &str,
    ensure: Ensure,
    decision: Decision,
    ctx: &ExecutionContext<'_>,
) -> Report {
    let kind = ctx.kind;
    let report = Report::new(name, decision.action());

    match decision {
        Decision::NoOp => match ensure {
            Ensure::Present => {
                report.succeeded(format!("{} {name} is already present", kind.title()))
            }
            Ensure::Absent => report.succeeded(format!(
                "{} {name} is not present, so it cannot be removed",
                kind.title()
            )),
        },
        Decision::Create(attrs) => {
            if ctx.dry_run() {
                return report.pending(format!("{} {name} is set to be created", kind.title()));
            }
            info!("creating {kind} {name}");
            match ctx.store.create(name, &attrs) {
                Ok(true) => report
                    .succeeded(format!("The {kind} {name} has been created"))
                    .with_change(Value::String("Present".to_string())),
                outcome => report.failed(failure_comment(
                    &format!("Failed to create {kind} {name}"),
                    outcome,
                )),
            }
        }
        Decision::Update(attrs) => {
            if ctx.dry_run() {
                return report.pending(format!("{} {name} is set to be updated", kind.title()));
            }
            info!("updating {kind} {name}");
            match ctx.store.update(name, &attrs) {
                Ok(true) => report
                    .succeeded(format!("The {kind} {name} has been updated"))
                    .with_change(Value::Object(attrs.change_record())),
                outcome => report.failed(failure_comment(
                    &format!("Failed to update {kind} {name}"),
                    outcome,
                )),
            }
        }
        Decision::Remove => {
            if ctx.dry_run() {
                return report.pending(format!("{} {name} is set to be removed", kind.title()));
            }
            info!("removing {kind} {name}");
            match ctx.store.remove(name) {
                Ok(true) => report
                    .succeeded(format!("{} {name} has been removed", kind.title()))
                    .with_change(Value::String("Absent".to_string())),
                outcome => report.failed(failure_comment(
                    &format!("{} {name} failed to be removed", kind.title()),
                    outcome,
                )),
            }
        }
    }
}

fn failure_comment(base: &str, outcome: Result<bool>) -> String {
    match outcome {
        Err(e) => {
            warn!("{base}: {e:#}");
            format!("{base}: {e:#}")
        }
        Ok(_) => {
            warn!("{base}");
            base.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialEncoding;

    fn canonical(spec: RoleSpec) -> CanonicalRole {
        resolve(&spec, CredentialEncoding::Plain)
    }

    #[test]
    fn test_missing_role_is_created_with_specified_attributes() {
        let desired = canonical(RoleSpec::new("g").with_login(false).with_credential("password"));
        match decide_present(&desired, None, false) {
            Decision::Create(attrs) => {
                assert_eq!(attrs.login, Some(false));
                assert_eq!(attrs.createdb, None);
                assert!(attrs.credential.is_some());
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn test_matching_role_is_noop() {
        let desired = canonical(RoleSpec::new("g").with_inherit(true));
        let observed = ObservedRole::with_defaults("g");
        assert_eq!(decide_present(&desired, Some(&observed), false), Decision::NoOp);
    }

    #[test]
    fn test_drift_is_update_with_diff_only() {
        let desired = canonical(RoleSpec::new("g").with_inherit(true).with_createdb(true));
        let observed = ObservedRole::with_defaults("g");
        let decision = decide_present(&desired, Some(&observed), false);
        assert_eq!(decision.action(), Action::Update);
        if let Decision::Update(attrs) = decision {
            assert_eq!(attrs.createdb, Some(true));
            assert_eq!(attrs.inherit, None);
        }
    }

    #[test]
    fn test_refresh_forces_update() {
        let desired = canonical(RoleSpec::new("g").with_credential("password"));
        let observed = ObservedRole::with_defaults("g");
        assert_eq!(
            decide_present(&desired, Some(&observed), true).action(),
            Action::Update
        );
    }

    #[test]
    fn test_decide_absent() {
        assert_eq!(decide_absent(true), Decision::Remove);
        assert_eq!(decide_absent(false), Decision::NoOp);
    }

    #[test]
    fn test_failure_comment_carries_error() {
        let comment = failure_comment("Failed to create group g", Err(anyhow::anyhow!("boom")));
        assert_eq!(comment, "Failed to create group g: boom");
        assert_eq!(failure_comment("Failed", Ok(false)), "Failed");
    }
}
