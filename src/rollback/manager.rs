//! The rollback ledger and its execution modes.

use super::operation::{RollbackAction, RollbackKind, RollbackOperation};
use super::policy::{FailFastPolicy, RollbackMode};
use super::report::{OperationOutcome, OperationReport, RollbackFailure, RollbackReport};
use super::resource::UndoableResource;
use crate::error::{GuardError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Ordered ledger of compensating actions.
///
/// Record a compensation after each side effect of a multi-step operation.
/// On success call [`RollbackManager::clear`]; on failure call
/// [`RollbackManager::execute`], which undoes the recorded effects last
/// first. See [`FailFastPolicy`] for how failures during execution are
/// handled.
pub struct RollbackManager {
    resource: Arc<dyn UndoableResource>,
    operations: Vec<RollbackOperation>,
    /// Reverse dependency index: id -> ids that depend on it.
    dependents: HashMap<usize, Vec<usize>>,
    policy: FailFastPolicy,
    last_error: Option<RollbackFailure>,
    last_report: Option<RollbackReport>,
}

impl RollbackManager {
    pub fn new(resource: Arc<dyn UndoableResource>) -> Self {
        Self {
            resource,
            operations: Vec::new(),
            dependents: HashMap::new(),
            policy: FailFastPolicy::Unset,
            last_error: None,
            last_report: None,
        }
    }

    /// Start with a policy, typically [`Config::fail_fast_policy`](crate::config::Config::fail_fast_policy).
    pub fn with_policy(mut self, policy: FailFastPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record removal of a worktree. Critical.
    pub fn add_worktree_cleanup<P: Into<PathBuf>>(&mut self, path: P) -> usize {
        let path = path.into();
        let description = format!("Remove worktree at {}", path.display());
        let resource = Arc::clone(&self.resource);
        self.push(
            RollbackKind::RemoveWorktree,
            description,
            true,
            Box::new(move || resource.remove_worktree(&path)),
        )
    }

    /// Record deletion of a branch. Not critical.
    pub fn add_branch_cleanup<S: Into<String>>(&mut self, branch: S) -> usize {
        let branch = branch.into();
        let description = format!("Delete branch {}", branch);
        let resource = Arc::clone(&self.resource);
        self.push(
            RollbackKind::DeleteBranch,
            description,
            false,
            Box::new(move || resource.delete_branch(&branch)),
        )
    }

    /// Record removal of a file or directory tree. Critical.
    pub fn add_file_cleanup<P: Into<PathBuf>>(&mut self, path: P) -> usize {
        let path = path.into();
        let description = format!("Remove files at {}", path.display());
        let resource = Arc::clone(&self.resource);
        self.push(
            RollbackKind::RemoveFiles,
            description,
            true,
            Box::new(move || resource.remove_path(&path)),
        )
    }

    /// Record removal of a set of symbolic links. Not critical.
    pub fn add_link_cleanup(&mut self, links: Vec<PathBuf>) -> usize {
        let description = format!("Remove {} symbolic links", links.len());
        let resource = Arc::clone(&self.resource);
        self.push(
            RollbackKind::CleanupLinks,
            description,
            false,
            Box::new(move || resource.remove_links(&links)),
        )
    }

    /// Record an arbitrary compensating action.
    pub fn add_action<S, F>(&mut self, description: S, critical: bool, action: F) -> usize
    where
        S: Into<String>,
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.push(
            RollbackKind::Custom,
            description.into(),
            critical,
            Box::new(action),
        )
    }

    fn push(
        &mut self,
        kind: RollbackKind,
        description: String,
        critical: bool,
        action: RollbackAction,
    ) -> usize {
        let id = self.operations.len();
        debug!(id, kind = %kind, critical, operation = %description, "recorded rollback operation");
        self.operations
            .push(RollbackOperation::new(id, kind, description, critical, action));
        id
    }

    /// Skip `dependent`'s compensation if `depends_on`'s compensation fails.
    pub fn add_dependency(&mut self, dependent: usize, depends_on: usize) -> Result<()> {
        for id in [dependent, depends_on] {
            if id >= self.operations.len() {
                return Err(GuardError::Validation(format!(
                    "unknown rollback operation id {} ({} recorded)",
                    id,
                    self.operations.len()
                )));
            }
        }

        let op = &mut self.operations[dependent];
        if !op.depends_on.contains(&depends_on) {
            op.depends_on.push(depends_on);
            self.dependents.entry(depends_on).or_default().push(dependent);
        }
        Ok(())
    }

    /// Set the fail-fast flag explicitly. See [`FailFastPolicy`].
    pub fn set_fail_fast(&mut self, fail_fast: bool) {
        self.policy = FailFastPolicy::Explicit(fail_fast);
    }

    pub fn fail_fast_policy(&self) -> FailFastPolicy {
        self.policy
    }

    pub fn has_operations(&self) -> bool {
        !self.operations.is_empty()
    }

    /// Descriptions of pending operations in insertion order.
    pub fn operation_descriptions(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|op| op.description.clone())
            .collect()
    }

    pub fn operations(&self) -> &[RollbackOperation] {
        &self.operations
    }

    /// Ids of pending operations that depend on `id`.
    pub fn dependents_of(&self, id: usize) -> &[usize] {
        self.dependents.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The most recent rollback failure. Survives clearing the ledger.
    pub fn last_error(&self) -> Option<&RollbackFailure> {
        self.last_error.as_ref()
    }

    /// Outcomes of the most recent non-empty [`RollbackManager::execute`].
    pub fn last_report(&self) -> Option<&RollbackReport> {
        self.last_report.as_ref()
    }

    /// Discard all pending operations without running them.
    pub fn clear(&mut self) {
        if !self.operations.is_empty() {
            debug!(count = self.operations.len(), "discarding rollback operations");
        }
        self.operations.clear();
        self.dependents.clear();
    }

    /// Run the pending compensations and clear the ledger.
    ///
    /// - Policy unset: critical operations first, then the rest, both last
    ///   recorded first. Failures are collected and execution continues.
    /// - Explicit `true`: the first critical failure aborts with
    ///   [`GuardError::CriticalRollback`]; nothing else runs.
    /// - Explicit `false`: criticality is ignored; operations run in passes
    ///   once everything they depend on has run. Operations that can never
    ///   become ready fail with a dependency constraint error.
    ///
    /// In every mode an operation whose dependency failed is never run, and
    /// collected failures are returned as [`GuardError::Rollback`]. An empty
    /// ledger is a no-op.
    pub fn execute(&mut self) -> Result<()> {
        if self.operations.is_empty() {
            return Ok(());
        }

        let mode = self.policy.mode();
        let mut execution = Execution::new(
            mode,
            std::mem::take(&mut self.operations),
            std::mem::take(&mut self.dependents),
        );
        info!(operations = execution.ops.len(), mode = %mode, "executing rollback");

        let outcome = match mode {
            RollbackMode::BestEffort => execution.run_phased(false),
            RollbackMode::Strict => execution.run_phased(true),
            RollbackMode::DependencyGraph => {
                execution.run_graph();
                Ok(())
            }
        };

        if let Some(failure) = execution.last_error.take() {
            self.last_error = Some(failure);
        }
        let report = execution.report;
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            aborted = report.aborted,
            "rollback finished"
        );
        let failures = report.failures();
        self.last_report = Some(report);

        outcome?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(GuardError::Rollback { failures })
        }
    }
}

impl fmt::Debug for RollbackManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackManager")
            .field("operations", &self.operations)
            .field("policy", &self.policy)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

/// State of one `execute()` call.
struct Execution {
    ops: Vec<RollbackOperation>,
    dependents: HashMap<usize, Vec<usize>>,
    outcomes: Vec<Option<OperationOutcome>>,
    report: RollbackReport,
    last_error: Option<RollbackFailure>,
}

impl Execution {
    fn new(
        mode: RollbackMode,
        ops: Vec<RollbackOperation>,
        dependents: HashMap<usize, Vec<usize>>,
    ) -> Self {
        let outcomes = vec![None; ops.len()];
        Self {
            ops,
            dependents,
            outcomes,
            report: RollbackReport::new(mode),
            last_error: None,
        }
    }

    /// Critical operations, then non-critical ones, each last recorded first.
    fn run_phased(&mut self, abort_on_critical: bool) -> Result<()> {
        for id in (0..self.ops.len()).rev() {
            if !self.ops[id].critical || self.outcomes[id].is_some() {
                continue;
            }
            if let Err(cause) = self.run(id)
                && abort_on_critical
            {
                self.report.aborted = true;
                let operation = self.ops[id].description.clone();
                error!(operation = %operation, "aborting rollback after critical failure");
                return Err(GuardError::CriticalRollback { operation, cause });
            }
        }

        for id in (0..self.ops.len()).rev() {
            if self.ops[id].critical || self.outcomes[id].is_some() {
                continue;
            }
            let _ = self.run(id);
        }

        Ok(())
    }

    /// Fix-point passes over the pending operations, last recorded first.
    fn run_graph(&mut self) {
        let mut pending: Vec<usize> = (0..self.ops.len()).rev().collect();

        while !pending.is_empty() {
            let mut progress = false;
            let mut blocked = Vec::new();

            for id in pending {
                if self.outcomes[id].is_some() {
                    continue;
                }
                if self.is_ready(id) {
                    let _ = self.run(id);
                    progress = true;
                } else {
                    blocked.push(id);
                }
            }

            pending = blocked;
            if !progress && !pending.is_empty() {
                for &id in &pending {
                    if self.outcomes[id].is_none() {
                        warn!(
                            operation = %self.ops[id].description,
                            "rollback operation blocked by dependency constraints"
                        );
                        self.record(id, OperationOutcome::SkippedByCycle);
                    }
                }
                break;
            }
        }
    }

    /// Whether every dependency of `id` has been attempted.
    fn is_ready(&self, id: usize) -> bool {
        self.ops[id].depends_on.iter().all(|&dep| {
            self.outcomes[dep]
                .as_ref()
                .is_some_and(OperationOutcome::was_executed)
        })
    }

    /// Invoke the action of `id` and record the outcome.
    fn run(&mut self, id: usize) -> std::result::Result<(), String> {
        let op = &mut self.ops[id];
        let result = op.run();
        match &result {
            Ok(()) => {
                debug!(id, operation = %op.description, "rollback operation succeeded");
                self.resolve(id, OperationOutcome::Succeeded);
            }
            Err(cause) => {
                if op.critical {
                    error!(id, operation = %op.description, error = %cause, "critical rollback operation failed");
                } else {
                    warn!(id, operation = %op.description, error = %cause, "rollback operation failed");
                }
                self.resolve(id, OperationOutcome::Failed(cause.clone()));
            }
        }
        result
    }

    /// Record the outcome of `id` and skip everything that transitively
    /// depends on it if it did not succeed.
    fn resolve(&mut self, id: usize, outcome: OperationOutcome) {
        let blocks = outcome.blocks_dependents();
        self.record(id, outcome);
        if !blocks {
            return;
        }

        let mut stack = vec![id];
        while let Some(blocked) = stack.pop() {
            let dependents = self.dependents.get(&blocked).cloned().unwrap_or_default();
            for dependent in dependents {
                if self.outcomes[dependent].is_none() {
                    debug!(
                        id = dependent,
                        dependency = blocked,
                        operation = %self.ops[dependent].description,
                        "skipping rollback operation after dependency failure"
                    );
                    self.record(
                        dependent,
                        OperationOutcome::SkippedByDependency { dependency: blocked },
                    );
                    stack.push(dependent);
                }
            }
        }
    }

    fn record(&mut self, id: usize, outcome: OperationOutcome) {
        let op = &self.ops[id];
        let entry = OperationReport {
            id,
            kind: op.kind.clone(),
            description: op.description.clone(),
            critical: op.critical,
            outcome: outcome.clone(),
        };

        match &outcome {
            OperationOutcome::Failed(cause) => {
                self.last_error = Some(RollbackFailure {
                    operation: op.description.clone(),
                    cause: cause.clone(),
                });
            }
            OperationOutcome::SkippedByCycle => {
                self.last_error = Some(RollbackFailure {
                    operation: op.description.clone(),
                    cause: super::report::DEPENDENCY_CONSTRAINT.to_string(),
                });
            }
            _ => {}
        }

        self.outcomes[id] = Some(outcome);
        self.report.entries.push(entry);
    }
}
