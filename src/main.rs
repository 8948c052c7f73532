mod cli;
mod commands;
mod config;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub json: bool,
    pub config: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        json: cli.json,
        config: cli.config,
    };

    let converged = match cli.command {
        Command::Apply(args) => {
            commands::apply::apply(&ctx, &args.manifest, args.dry_run, args.yes)?
        }
        Command::Plan(args) => commands::apply::plan(&ctx, &args.manifest)?,
        Command::Present(args) => commands::role::present(&ctx, &args)?,
        Command::Absent(args) => commands::role::absent(&ctx, &args)?,
        Command::Hash { name, password } => commands::hash::run(&name, &password)?,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "rolesync", &mut io::stdout());
            true
        }
    };

    Ok(if converged {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
