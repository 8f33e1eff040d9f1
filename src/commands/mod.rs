//! Command implementations for wtree-guard.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Each command returns the process exit code on success.

mod lock;
mod run;

use crate::cli::{Command, LockAction, LockCommand};
use crate::config::Config;
use crate::error::Result;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command, config: &Config) -> Result<i32> {
    match command {
        Command::Lock(lock_cmd) => dispatch_lock(lock_cmd, config),
        Command::Run(args) => run::cmd_run(args, config),
    }
}

/// Dispatch lock subcommands.
fn dispatch_lock(lock_cmd: LockCommand, config: &Config) -> Result<i32> {
    match lock_cmd.action {
        LockAction::List(args) => lock::cmd_lock_list(args, config),
        LockAction::Clear(args) => lock::cmd_lock_clear(args, config),
        LockAction::Prune => lock::cmd_lock_prune(config),
    }
}
