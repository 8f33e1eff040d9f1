//! File-based operation locks and compensating rollback for git worktree
//! workflows.
//!
//! - [`locks`]: cross-process mutual exclusion keyed by operation kind and
//!   target path, using exclusive-create lock files in a shared directory.
//! - [`rollback`]: an in-process ledger of compensating actions executed in
//!   reverse order when a multi-step operation fails.
//! - [`transaction`]: the acquire, record, undo-or-discard, release flow
//!   that combines the two.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod git;
pub mod locks;
pub mod logging;
pub mod rollback;
pub mod transaction;

#[cfg(test)]
pub(crate) mod test_support;
