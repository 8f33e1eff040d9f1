//! Lock key derivation.

use super::types::LockKind;
use crate::error::{GuardError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Prefix shared by every lock file name.
pub const LOCK_PREFIX: &str = "wtree";

/// Number of digest bytes kept in the key (rendered as twice as many hex chars).
const HASH_BYTES: usize = 8;

/// Deterministic name of a lock: `wtree-<kind>-<hash>`.
///
/// The same kind and normalized target always produce the same key; a
/// different kind on the same target produces a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    /// Derive the key for `kind` on `target`, normalizing the target first.
    pub fn new(kind: &LockKind, target: &Path) -> Result<Self> {
        let normalized = normalize_target(target)?;
        Ok(Self::from_normalized(kind, &normalized))
    }

    /// Derive the key for an already normalized target.
    pub fn from_normalized(kind: &LockKind, normalized: &Path) -> Self {
        let digest = Sha256::digest(normalized.as_os_str().as_encoded_bytes());
        let path_hash = hex::encode(&digest[..HASH_BYTES]);
        Self(format!("{}-{}-{}", LOCK_PREFIX, kind.as_str(), path_hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the lock inside the lock directory.
    pub fn file_name(&self) -> String {
        format!("{}.lock", self.0)
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Make `target` absolute and lexically remove `.` and `..` components.
///
/// The target does not need to exist (a worktree being created has no
/// directory yet), so symlinks are not resolved.
pub fn normalize_target(target: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(target).map_err(|e| {
        GuardError::Validation(format!(
            "invalid lock target '{}': {}",
            target.display(),
            e
        ))
    })?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
