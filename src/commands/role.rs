//! Single-role convergence: `rolesync present` and `rolesync absent`.

use anyhow::{Context as AnyhowContext, Result, bail};
use chrono::{DateTime, Utc};
use declarative::{CredentialEncoding, ExecutionContext, Mode, RoleKind, RoleSpec};

use super::{backend, show};
use crate::Context;
use crate::cli::{AbsentArgs, PresentArgs};
use crate::config::Settings;

/// Build a role spec from command-line flags
fn spec_from_args(args: &PresentArgs) -> Result<RoleSpec> {
    if args.name.is_empty() {
        bail!("Role name must not be empty");
    }

    let encoding = args
        .encoding
        .as_deref()
        .map(str::parse::<CredentialEncoding>)
        .transpose()?;

    let valid_until = args
        .valid_until
        .as_deref()
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|at| at.with_timezone(&Utc))
                .with_context(|| format!("Invalid --valid-until '{s}'"))
        })
        .transpose()?;

    Ok(RoleSpec {
        credential: args.password.clone(),
        encoding,
        superuser: args.superuser,
        createdb: args.createdb,
        createrole: args.createrole,
        login: args.login,
        inherit: args.inherit,
        replication: args.replication,
        connection_limit: args.connection_limit,
        valid_until,
        groups: args.groups.clone(),
        refresh_credential: args.refresh_password,
        ..RoleSpec::new(&args.name)
    })
}

pub fn present(ctx: &Context, args: &PresentArgs) -> Result<bool> {
    let spec = spec_from_args(args)?;
    let settings = Settings::load(ctx.config.as_deref())?;
    let kind = RoleKind::from(args.kind);
    let backend = backend(&settings, kind)?;

    let exec = ExecutionContext::new(&backend, Mode::from_dry_run(args.dry_run))
        .with_default_encoding(settings.defaults.encoding)
        .with_kind(kind);

    let report = declarative::present(&spec, &exec)?;
    show(ctx, &report);
    Ok(!report.is_failure())
}

pub fn absent(ctx: &Context, args: &AbsentArgs) -> Result<bool> {
    if args.name.is_empty() {
        bail!("Role name must not be empty");
    }
    let settings = Settings::load(ctx.config.as_deref())?;
    let kind = RoleKind::from(args.kind);
    let backend = backend(&settings, kind)?;

    let exec = ExecutionContext::new(&backend, Mode::from_dry_run(args.dry_run)).with_kind(kind);

    let report = declarative::absent(&args.name, &exec)?;
    show(ctx, &report);
    Ok(!report.is_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn parse_present(args: &[&str]) -> PresentArgs {
        let argv = ["rolesync", "present"].iter().chain(args);
        match Cli::parse_from(argv).command {
            Command::Present(args) => args,
            _ => unreachable!("parsed a different command"),
        }
    }

    #[test]
    fn test_spec_from_minimal_args() {
        let spec = spec_from_args(&parse_present(&["readers"])).unwrap();
        assert_eq!(spec, RoleSpec::new("readers"));
    }

    #[test]
    fn test_spec_from_full_args() {
        let args = parse_present(&[
            "alice",
            "--kind",
            "user",
            "--password",
            "s3cret",
            "--encoding",
            "hashed",
            "--login",
            "true",
            "--connection-limit",
            "-1",
            "--valid-until",
            "2030-01-01T00:00:00+02:00",
            "--groups",
            "readers,writers",
            "--refresh-password",
        ]);
        let spec = spec_from_args(&args).unwrap();

        assert_eq!(spec.credential.as_deref(), Some("s3cret"));
        assert_eq!(spec.encoding, Some(CredentialEncoding::Hashed));
        assert_eq!(spec.login, Some(true));
        assert_eq!(spec.connection_limit, Some(-1));
        assert_eq!(
            spec.valid_until.map(|at| at.to_rfc3339()).as_deref(),
            Some("2029-12-31T22:00:00+00:00")
        );
        assert_eq!(
            spec.groups,
            Some(vec!["readers".to_string(), "writers".to_string()])
        );
        assert!(spec.refresh_credential);
        assert_eq!(RoleKind::from(args.kind), RoleKind::User);
    }

    #[test]
    fn test_spec_rejects_bad_values() {
        assert!(spec_from_args(&parse_present(&["g", "--encoding", "rot13"])).is_err());
        assert!(spec_from_args(&parse_present(&["g", "--valid-until", "tomorrow"])).is_err());
    }
}
