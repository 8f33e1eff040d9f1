//! Capabilities the rollback ledger calls into.

use crate::error::{GuardError, Result};
use crate::git;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The side effects a rollback can undo.
///
/// Worktree and branch removal have no sensible default and must be
/// supplied by the implementor. Path and link removal default to plain
/// filesystem operations that treat "already gone" as success.
pub trait UndoableResource: Send + Sync {
    /// Remove a worktree, discarding local changes.
    fn remove_worktree(&self, path: &Path) -> Result<()>;

    /// Delete a branch even if it is not merged.
    fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Remove a file or a directory tree.
    fn remove_path(&self, path: &Path) -> Result<()> {
        remove_path_all(path)
    }

    /// Remove each link, stopping at the first failure.
    fn remove_links(&self, links: &[PathBuf]) -> Result<()> {
        for link in links {
            match fs::remove_file(link) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(GuardError::FileSystem(format!(
                        "failed to remove link '{}': {}",
                        link.display(),
                        e
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Undoes worktree and branch creation in a git repository.
#[derive(Debug, Clone)]
pub struct GitResource {
    repo_root: PathBuf,
}

impl GitResource {
    pub fn new<P: Into<PathBuf>>(repo_root: P) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

impl UndoableResource for GitResource {
    fn remove_worktree(&self, path: &Path) -> Result<()> {
        git::remove_worktree(&self.repo_root, path, true)
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        git::delete_branch(&self.repo_root, branch, true)
    }
}

/// Remove `path` whether it is a file, a symlink, or a directory tree.
/// A missing path is not an error.
fn remove_path_all(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(GuardError::FileSystem(format!(
                "failed to inspect '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GuardError::FileSystem(format!(
            "failed to remove '{}': {}",
            path.display(),
            e
        ))),
    }
}
