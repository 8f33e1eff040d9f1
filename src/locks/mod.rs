//! Locking subsystem for wtree-guard.
//!
//! Provides cross-process mutual exclusion for worktree operations using the
//! filesystem as the only shared state.
//!
//! # Lock Files
//!
//! Each `(kind, target)` pair maps to `<lock-dir>/wtree-<kind>-<hash>.lock`,
//! where `<hash>` is a truncated SHA-256 of the normalized absolute target
//! path. Lock files are created using **create_new** semantics (exclusive
//! create), so only one process can hold a given lock at a time. Locks of
//! different kinds on the same target are independent.
//!
//! # Stale Locks
//!
//! A lock whose recorded pid no longer exists is stale and is reclaimed by
//! the next acquirer. Liveness is a heuristic: PIDs can be reused, and a hung
//! holder is indistinguishable from a busy one.

mod handle;
mod key;
mod liveness;
mod manager;
mod operations;
mod record;
mod stale;
mod types;


// Re-export public API
pub use handle::{DEFAULT_RETRY_INTERVAL, OperationLock};
pub use key::{LOCK_PREFIX, LockKey, normalize_target};
pub use liveness::process_alive;
pub use manager::LockManager;
pub use operations::{clear_lock, list_locks, prune_stale_locks};
pub use record::LockRecord;
pub use types::{LockInfo, LockKind};
