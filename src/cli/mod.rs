//! CLI argument parsing for wtree-guard.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::locks::LockKind;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// wtree-guard: cross-process operation locks for git worktree tooling.
///
/// Locks live as files in a shared lock directory:
/// - One file per (operation kind, target path)
/// - The file records the holder's pid, operation and start time
/// - Locks whose holder has exited are reclaimed automatically
#[derive(Parser, Debug)]
#[command(name = "wtree-guard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a YAML config file (overrides WTREE_GUARD_CONFIG).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Lock directory (overrides the config file).
    #[arg(long, global = true, value_name = "DIR")]
    pub lock_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for wtree-guard.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lock management commands.
    ///
    /// List, clear, or prune lock files in the lock directory.
    Lock(LockCommand),

    /// Run a command while holding a lock.
    ///
    /// Acquires the lock for the given kind and target, runs the command,
    /// and releases the lock when the command exits. The command's exit
    /// code becomes wtree-guard's exit code.
    Run(RunArgs),
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List all lock files.
    ///
    /// Shows each lock's holder pid, operation, age, owner, and whether
    /// the holder is gone.
    List(LockListArgs),

    /// Clear a specific lock.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LockClearArgs),

    /// Remove every lock whose holder is no longer running.
    Prune,
}

/// Arguments for the `lock list` command.
#[derive(Parser, Debug)]
pub struct LockListArgs {
    /// Print the locks as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Lock name as shown by `lock list` (e.g., wtree-create-0123456789abcdef).
    pub name: String,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Operation kind (create, delete, merge, switch, cleanup, or a custom
    /// lowercase name).
    #[arg(long)]
    pub kind: LockKind,

    /// Path the operation targets.
    #[arg(long)]
    pub target: PathBuf,

    /// Seconds to wait for the lock (defaults to the configured timeout).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to remove if the command fails (repeatable). Removed last
    /// given first.
    #[arg(long = "cleanup", value_name = "PATH")]
    pub cleanup: Vec<PathBuf>,

    /// Command to run, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}
