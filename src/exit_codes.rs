//! Exit code constants for the wtree-guard CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, double acquire)
//! - 2: Rollback failure (critical or aggregate)
//! - 3: Git operation failure
//! - 4: Lock failure (timeout, release)
//! - 5: Filesystem failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or a rejected request.
pub const USER_ERROR: i32 = 1;

/// One or more compensating actions failed.
pub const ROLLBACK_FAILURE: i32 = 2;

/// Git operation failure: worktree removal, branch deletion.
pub const GIT_FAILURE: i32 = 3;

/// Lock acquisition timed out or a lock could not be released.
pub const LOCK_FAILURE: i32 = 4;

/// Unexpected filesystem error.
pub const FILESYSTEM_FAILURE: i32 = 5;
