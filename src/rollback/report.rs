//! Outcome of one rollback execution.

use super::operation::RollbackKind;
use super::policy::RollbackMode;
use std::fmt;

/// Message recorded for operations stuck behind a dependency cycle.
pub const DEPENDENCY_CONSTRAINT: &str = "operation cannot be executed due to dependency constraints";

/// Final state of one operation within an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded,
    Failed(String),
    /// Not run because the compensation of `dependency` failed or was skipped.
    SkippedByDependency { dependency: usize },
    /// Not run because its dependencies could never all be attempted.
    SkippedByCycle,
}

impl OperationOutcome {
    /// Whether the action was invoked.
    pub fn was_executed(&self) -> bool {
        matches!(self, OperationOutcome::Succeeded | OperationOutcome::Failed(_))
    }

    /// Whether dependents of this operation must be skipped.
    pub fn blocks_dependents(&self) -> bool {
        !matches!(self, OperationOutcome::Succeeded)
    }

    /// Whether this outcome counts toward the aggregate rollback error.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            OperationOutcome::Failed(_) | OperationOutcome::SkippedByCycle
        )
    }
}

/// One resolved ledger entry.
#[derive(Debug, Clone)]
pub struct OperationReport {
    pub id: usize,
    pub kind: RollbackKind,
    pub description: String,
    pub critical: bool,
    pub outcome: OperationOutcome,
}

impl OperationReport {
    /// `"<description>: <cause>"` for entries that count as errors.
    pub fn failure_message(&self) -> Option<String> {
        match &self.outcome {
            OperationOutcome::Failed(cause) => Some(format!("{}: {}", self.description, cause)),
            OperationOutcome::SkippedByCycle => {
                Some(format!("{}: {}", DEPENDENCY_CONSTRAINT, self.description))
            }
            _ => None,
        }
    }
}

/// Per-operation results of a [`RollbackManager::execute`](super::RollbackManager::execute)
/// call, in the order operations were resolved.
#[derive(Debug, Clone)]
pub struct RollbackReport {
    pub mode: RollbackMode,
    pub entries: Vec<OperationReport>,
    /// Set when a critical failure stopped execution early; entries not
    /// listed were never attempted.
    pub aborted: bool,
}

impl RollbackReport {
    pub(crate) fn new(mode: RollbackMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
            aborted: false,
        }
    }

    /// Ids of operations whose actions ran, in the order they ran.
    pub fn executed_ids(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| e.outcome.was_executed())
            .map(|e| e.id)
            .collect()
    }

    pub fn outcome(&self, id: usize) -> Option<&OperationOutcome> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.outcome)
    }

    /// Messages of every entry that counts as an error.
    pub fn failures(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(OperationReport::failure_message)
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, OperationOutcome::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(OperationOutcome::is_error)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, OperationOutcome::SkippedByDependency { .. }))
    }

    /// True when every recorded operation succeeded and nothing was aborted.
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.entries.iter().all(|e| e.outcome == OperationOutcome::Succeeded)
    }

    fn count(&self, pred: impl Fn(&OperationOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// The most recent failure seen by a rollback manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackFailure {
    /// Description of the operation that failed.
    pub operation: String,
    pub cause: String,
}

impl fmt::Display for RollbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.cause)
    }
}
