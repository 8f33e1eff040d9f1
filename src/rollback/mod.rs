//! Compensating-action ledger for multi-step operations.
//!
//! As an operation creates worktrees, branches, files, and links, it records
//! how to undo each step in a [`RollbackManager`]. If the operation fails,
//! [`RollbackManager::execute`] undoes the recorded steps in reverse order;
//! if it succeeds, [`RollbackManager::clear`] discards them.
//!
//! # Execution Modes
//!
//! The [`FailFastPolicy`] selects one of three modes:
//!
//! | Policy | Mode | On critical failure |
//! | --- | --- | --- |
//! | unset (default) | best-effort | record, keep going, run non-critical phase |
//! | explicit `true` | strict | clear the ledger and return immediately |
//! | explicit `false` | dependency-graph | criticality ignored |
//!
//! Ledgers live in memory only; a process that dies mid-operation leaves
//! its compensations unrun.

mod manager;
mod operation;
mod policy;
mod report;
mod resource;

#[cfg(test)]
mod tests;

// Re-export public API
pub use manager::RollbackManager;
pub use operation::{RollbackAction, RollbackKind, RollbackOperation};
pub use policy::{FailFastPolicy, RollbackMode};
pub use report::{
    DEPENDENCY_CONSTRAINT, OperationOutcome, OperationReport, RollbackFailure, RollbackReport,
};
pub use resource::{GitResource, UndoableResource};
