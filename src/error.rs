//! Error types for wtree-guard.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for lock and rollback operations.
///
/// Each variant maps to a specific exit code, see [`exit_codes`].
#[derive(Error, Debug)]
pub enum GuardError {
    /// User provided invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// A request was rejected before touching the filesystem
    /// (e.g. the same process already holds the lock).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The lock was not obtained within the timeout.
    #[error("timeout waiting for lock: {kind} on {target}{}", holder_suffix(.holder))]
    LockTimeout {
        kind: String,
        target: String,
        /// Description of the current holder, when its record was readable.
        holder: Option<String>,
    },

    /// Unexpected I/O failure (anything other than "lock file already exists").
    #[error("filesystem error: {0}")]
    FileSystem(String),

    /// Git operation failed.
    #[error("git operation failed: {0}")]
    GitError(String),

    /// A critical compensating action failed while fail-fast was explicitly requested.
    #[error("critical rollback operation failed: {operation}: {cause}")]
    CriticalRollback { operation: String, cause: String },

    /// Rollback ran to completion but one or more compensations failed.
    #[error("rollback completed with {} errors: {}", .failures.len(), .failures.join("; "))]
    Rollback { failures: Vec<String> },

    /// One or more locks could not be released.
    #[error("failed to release {} locks: {}", .failures.len(), .failures.join("; "))]
    LockRelease { failures: Vec<String> },

    /// A command run under a lock exited unsuccessfully; its code is passed through.
    #[error("command '{command}' exited with status {code}")]
    CommandFailed { command: String, code: i32 },
}

fn holder_suffix(holder: &Option<String>) -> String {
    match holder {
        Some(h) => format!(" (held by {})", h),
        None => String::new(),
    }
}

impl GuardError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            GuardError::UserError(_) => exit_codes::USER_ERROR,
            GuardError::Validation(_) => exit_codes::USER_ERROR,
            GuardError::LockTimeout { .. } => exit_codes::LOCK_FAILURE,
            GuardError::LockRelease { .. } => exit_codes::LOCK_FAILURE,
            GuardError::FileSystem(_) => exit_codes::FILESYSTEM_FAILURE,
            GuardError::GitError(_) => exit_codes::GIT_FAILURE,
            GuardError::CriticalRollback { .. } => exit_codes::ROLLBACK_FAILURE,
            GuardError::Rollback { .. } => exit_codes::ROLLBACK_FAILURE,
            GuardError::CommandFailed { code, .. } => *code,
        }
    }

    /// Whether this error came from a critical compensating action.
    pub fn is_critical_rollback(&self) -> bool {
        matches!(self, GuardError::CriticalRollback { .. })
    }
}

/// Result type alias for wtree-guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;
