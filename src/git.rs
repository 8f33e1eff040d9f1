//! Git command runner.
//!
//! Thin wrapper around the `git` binary with captured output and
//! structured errors. The git-backed rollback resource goes through here.

use crate::error::{GuardError, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Result of a successful git command execution.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Standard output from the command (trimmed).
    pub stdout: String,
    /// Standard error from the command (trimmed).
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Returns stdout lines as a vector.
    pub fn lines(&self) -> Vec<&str> {
        if self.stdout.is_empty() {
            Vec::new()
        } else {
            self.stdout.lines().collect()
        }
    }
}

/// Run a git command in `cwd`.
///
/// Returns `GuardError::GitError` (exit code 3) when git cannot be started
/// or exits non-zero; the message carries git's stderr.
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput> {
    let cwd = cwd.as_ref();

    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .map_err(|e| {
            GuardError::GitError(format!(
                "failed to execute git {}: {}",
                args.first().unwrap_or(&""),
                e
            ))
        })?;

    let git_output = GitOutput::from_output(&output);

    if output.status.success() {
        Ok(git_output)
    } else {
        let exit_code = output.status.code().unwrap_or(-1);
        let error_msg = if git_output.stderr.is_empty() {
            git_output.stdout.clone()
        } else {
            git_output.stderr.clone()
        };

        Err(GuardError::GitError(format!(
            "git {} failed (exit code {}): {}",
            args.first().unwrap_or(&""),
            exit_code,
            error_msg
        )))
    }
}

/// Remove a worktree registered in `repo_root`.
pub fn remove_worktree<P: AsRef<Path>>(
    repo_root: P,
    worktree_path: &Path,
    force: bool,
) -> Result<()> {
    let worktree_str = worktree_path.to_string_lossy();

    let args: Vec<&str> = if force {
        vec!["worktree", "remove", "--force", &worktree_str]
    } else {
        vec!["worktree", "remove", &worktree_str]
    };

    run_git(repo_root, &args).map_err(|e| {
        GuardError::GitError(format!("failed to remove worktree '{}': {}", worktree_str, e))
    })?;

    Ok(())
}

/// Delete a local branch. `force` uses `-D` so unmerged branches go too.
pub fn delete_branch<P: AsRef<Path>>(repo_root: P, branch: &str, force: bool) -> Result<()> {
    let delete_flag = if force { "-D" } else { "-d" };

    run_git(repo_root, &["branch", delete_flag, branch]).map_err(|e| {
        GuardError::GitError(format!("failed to delete branch '{}': {}", branch, e))
    })?;

    Ok(())
}

/// Whether a local branch exists.
pub fn branch_exists<P: AsRef<Path>>(repo_root: P, branch: &str) -> Result<bool> {
    let reference = format!("refs/heads/{}", branch);
    let output = Command::new("git")
        .current_dir(repo_root.as_ref())
        .args(["show-ref", "--verify", "--quiet", &reference])
        .output()
        .map_err(|e| GuardError::GitError(format!("failed to execute git show-ref: {}", e)))?;
    Ok(output.status.success())
}
