//! Lock inspection: listing, clearing, and pruning lock files.
//!
//! These operate on the lock directory directly, independent of any
//! [`LockManager`](super::LockManager), so an operator can inspect locks
//! left behind by other processes.

use super::key::LOCK_PREFIX;
use super::record::LockRecord;
use super::stale::{observe, reclaim};
use super::types::LockInfo;
use crate::error::{GuardError, Result};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// List all lock files in `lock_dir`, sorted by name.
///
/// A missing directory yields an empty list. Files that disappear while
/// listing are skipped.
pub fn list_locks(lock_dir: &Path) -> Result<Vec<LockInfo>> {
    let mut locks = Vec::new();

    let entries = match fs::read_dir(lock_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(locks),
        Err(e) => {
            return Err(GuardError::FileSystem(format!(
                "failed to read lock directory '{}': {}",
                lock_dir.display(),
                e
            )));
        }
    };

    for entry in entries {
        let entry = entry.map_err(|e| {
            GuardError::FileSystem(format!("failed to read lock directory entry: {}", e))
        })?;
        let path = entry.path();

        let Some(name) = lock_name(&path) else {
            continue;
        };

        let (record, is_stale) = match observe(&path) {
            Ok(observed) => (observed.record, observed.stale),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable lock file");
                (LockRecord::default(), true)
            }
        };

        locks.push(LockInfo {
            path,
            name,
            record,
            is_stale,
        });
    }

    locks.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(locks)
}

/// Remove the named lock file regardless of its holder.
///
/// `name` is the lock name as shown by [`list_locks`], with or without the
/// `.lock` extension. The caller is responsible for confirming that clearing
/// is appropriate.
pub fn clear_lock(lock_dir: &Path, name: &str) -> Result<LockInfo> {
    let name = name.strip_suffix(".lock").unwrap_or(name);
    validate_lock_name(name)?;

    let lock_path = lock_dir.join(format!("{}.lock", name));

    let (record, is_stale) = match observe(&lock_path) {
        Ok(observed) => (observed.record, observed.stale),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(GuardError::UserError(format!(
                "lock '{}' does not exist at: {}",
                name,
                lock_path.display()
            )));
        }
        Err(e) => {
            return Err(GuardError::FileSystem(format!(
                "failed to read lock file '{}': {}",
                lock_path.display(),
                e
            )));
        }
    };

    fs::remove_file(&lock_path).map_err(|e| {
        GuardError::FileSystem(format!(
            "failed to clear lock '{}': {}",
            lock_path.display(),
            e
        ))
    })?;

    info!(lock = name, holder = %record.describe(), stale = is_stale, "cleared lock");

    Ok(LockInfo {
        path: lock_path,
        name: name.to_string(),
        record,
        is_stale,
    })
}

/// Remove every stale lock in `lock_dir` and report the removed ones.
///
/// A lock that was replaced by a live holder between listing and removal is
/// left alone.
pub fn prune_stale_locks(lock_dir: &Path) -> Result<Vec<LockInfo>> {
    let mut pruned = Vec::new();

    for lock in list_locks(lock_dir)? {
        if !lock.is_stale {
            continue;
        }

        let observed = match observe(&lock.path) {
            Ok(observed) if observed.stale => observed,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(GuardError::FileSystem(format!(
                    "failed to read lock file '{}': {}",
                    lock.path.display(),
                    e
                )));
            }
        };

        let removed = reclaim(&lock.path, &observed).map_err(|e| {
            GuardError::FileSystem(format!(
                "failed to remove stale lock '{}': {}",
                lock.path.display(),
                e
            ))
        })?;

        if removed {
            info!(lock = %lock.name, holder = %lock.record.describe(), "pruned stale lock");
            pruned.push(lock);
        }
    }

    Ok(pruned)
}

/// Lock name for a path inside the lock directory, if it is one of ours.
fn lock_name(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("lock") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.starts_with(&format!("{}-", LOCK_PREFIX))
        .then(|| stem.to_string())
}

fn validate_lock_name(name: &str) -> Result<()> {
    let valid = name.starts_with(&format!("{}-", LOCK_PREFIX))
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(GuardError::UserError(format!(
            "invalid lock name '{}': expected a name like '{}-create-0123456789abcdef'",
            name, LOCK_PREFIX
        )))
    }
}
