//! wtree-guard: cross-process operation locks for git worktree tooling.
//!
//! This is the main entry point for the `wtree-guard` CLI. It parses
//! arguments, loads configuration, dispatches to the appropriate command
//! handler, and handles errors with proper exit codes.

use clap::Parser;
use std::process::ExitCode;
use wtree_guard::cli::Cli;
use wtree_guard::config::Config;
use wtree_guard::error::{GuardError, Result};
use wtree_guard::{commands, logging};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(code) => exit_code(code),
        // The child already reported its own failure.
        Err(err @ GuardError::CommandFailed { .. }) => exit_code(err.exit_code()),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);
            exit_code(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(lock_dir) = cli.lock_dir {
        config.lock_dir = Some(lock_dir);
    }
    commands::dispatch(cli.command, &config)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
