//! Lock kind definitions and lock information structures.

use super::record::LockRecord;
use crate::error::{GuardError, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Longest accepted caller-defined kind name.
const MAX_KIND_LEN: usize = 32;

/// Kind of operation a lock protects.
///
/// Locks of different kinds on the same target live in independent
/// namespaces and never conflict with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Creating a worktree.
    Create,
    /// Deleting a worktree.
    Delete,
    /// Merging a worktree's branch.
    Merge,
    /// Switching to a worktree.
    Switch,
    /// Cleaning up stale worktrees.
    Cleanup,
    /// Caller-defined kind (lowercase ASCII letters, digits, `_`).
    Custom(String),
}

impl LockKind {
    /// Build a caller-defined kind, validating that it is safe to embed in a file name.
    pub fn custom(name: &str) -> Result<Self> {
        if name.is_empty() || name.len() > MAX_KIND_LEN {
            return Err(GuardError::Validation(format!(
                "lock kind must be 1-{} characters (got '{}')",
                MAX_KIND_LEN, name
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(GuardError::Validation(format!(
                "lock kind '{}' may only contain lowercase letters, digits and '_'",
                name
            )));
        }
        Ok(match name {
            "create" => LockKind::Create,
            "delete" => LockKind::Delete,
            "merge" => LockKind::Merge,
            "switch" => LockKind::Switch,
            "cleanup" => LockKind::Cleanup,
            other => LockKind::Custom(other.to_string()),
        })
    }

    /// Get the name used in lock file names and lock records.
    pub fn as_str(&self) -> &str {
        match self {
            LockKind::Create => "create",
            LockKind::Delete => "delete",
            LockKind::Merge => "merge",
            LockKind::Switch => "switch",
            LockKind::Cleanup => "cleanup",
            LockKind::Custom(name) => name.as_str(),
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockKind {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self> {
        LockKind::custom(s)
    }
}

/// Information about a lock file found in the lock directory.
#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    /// The lock file path.
    pub path: PathBuf,

    /// The lock name (file stem, e.g. `wtree-create-0123456789abcdef`).
    pub name: String,

    /// The parsed lock record.
    pub record: LockRecord,

    /// Whether the recorded owner is gone (or the record is unreadable).
    pub is_stale: bool,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (pid: {}, operation: {}, age: {}, owner: {}{})",
            self.name,
            self.record
                .pid
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".to_string()),
            if self.record.operation.is_empty() {
                "?"
            } else {
                self.record.operation.as_str()
            },
            self.record.age_string(),
            self.record.owner.as_deref().unwrap_or("unknown"),
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}
