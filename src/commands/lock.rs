//! `wtree-guard lock` subcommands.

use crate::cli::{LockClearArgs, LockListArgs};
use crate::config::Config;
use crate::error::{GuardError, Result};
use crate::exit_codes;
use crate::locks::{self, LockInfo};

pub(super) fn cmd_lock_list(args: LockListArgs, config: &Config) -> Result<i32> {
    let lock_dir = config.lock_dir();
    let locks = locks::list_locks(&lock_dir)?;

    if args.json {
        let json = serde_json::to_string_pretty(&locks)
            .map_err(|e| GuardError::UserError(format!("failed to serialize locks: {}", e)))?;
        println!("{}", json);
        return Ok(exit_codes::SUCCESS);
    }

    if locks.is_empty() {
        println!("No active locks in {}.", lock_dir.display());
        return Ok(exit_codes::SUCCESS);
    }

    println!("Active locks ({}):", locks.len());
    println!();

    for lock in &locks {
        print_lock_details(lock, "  ");
        println!();
    }

    let stale_count = locks.iter().filter(|l| l.is_stale).count();
    if stale_count > 0 {
        println!(
            "Note: {} lock(s) are stale. Use `wtree-guard lock prune` to remove them.",
            stale_count
        );
    }

    Ok(exit_codes::SUCCESS)
}

pub(super) fn cmd_lock_clear(args: LockClearArgs, config: &Config) -> Result<i32> {
    if !args.force {
        return Err(GuardError::UserError(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a lock while its holder is still running lets two processes \
             modify the same worktree.\n\
             Only clear locks if you are certain the lock holder has crashed.\n\n\
             To clear the lock, run:\n  wtree-guard lock clear {} --force",
            args.name
        )));
    }

    let cleared = locks::clear_lock(&config.lock_dir(), &args.name)?;

    println!("Cleared lock: {}", cleared.name);
    println!();
    println!("Lock details:");
    print_lock_details(&cleared, "");

    Ok(exit_codes::SUCCESS)
}

pub(super) fn cmd_lock_prune(config: &Config) -> Result<i32> {
    let pruned = locks::prune_stale_locks(&config.lock_dir())?;

    if pruned.is_empty() {
        println!("No stale locks.");
        return Ok(exit_codes::SUCCESS);
    }

    println!("Pruned {} stale lock(s):", pruned.len());
    for lock in &pruned {
        println!("  {}", lock);
    }

    Ok(exit_codes::SUCCESS)
}

fn print_lock_details(lock: &LockInfo, indent: &str) {
    let record = &lock.record;
    println!("{}{}:", indent, lock.name);
    match record.pid {
        Some(pid) => println!("{}  PID:        {}", indent, pid),
        None => println!("{}  PID:        unknown", indent),
    }
    if !record.operation.is_empty() {
        println!("{}  Operation:  {}", indent, record.operation);
    }
    if let Some(time) = record.time {
        println!("{}  Acquired:   {}", indent, time.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("{}  Age:        {}", indent, record.age_string());
    if let Some(owner) = &record.owner {
        println!("{}  Owner:      {}", indent, owner);
    }
    if lock.is_stale {
        println!("{}  Status:     STALE (holder is not running)", indent);
    }
    println!("{}  Path:       {}", indent, lock.path.display());
}
