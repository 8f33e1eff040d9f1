//! Tests for the rollback ledger.

use super::*;
use crate::error::{GuardError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records every call; fails the worktrees and branches it is told to.
#[derive(Default)]
struct MockResource {
    calls: Mutex<Vec<String>>,
    failing_worktrees: HashSet<PathBuf>,
    failing_branches: HashSet<String>,
}

impl MockResource {
    fn failing_worktree(path: &str) -> Self {
        Self {
            failing_worktrees: HashSet::from([PathBuf::from(path)]),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl UndoableResource for MockResource {
    fn remove_worktree(&self, path: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("worktree {}", path.display()));
        if self.failing_worktrees.contains(path) {
            return Err(GuardError::GitError("worktree is locked".to_string()));
        }
        Ok(())
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("branch {}", branch));
        if self.failing_branches.contains(branch) {
            return Err(GuardError::GitError("branch is checked out".to_string()));
        }
        Ok(())
    }
}

type Log = Arc<Mutex<Vec<&'static str>>>;

fn manager() -> RollbackManager {
    RollbackManager::new(Arc::new(MockResource::default()))
}

fn ok(log: &Log, name: &'static str) -> impl FnOnce() -> Result<()> + Send + 'static {
    let log = Arc::clone(log);
    move || {
        log.lock().unwrap().push(name);
        Ok(())
    }
}

fn fail(log: &Log, name: &'static str) -> impl FnOnce() -> Result<()> + Send + 'static {
    let log = Arc::clone(log);
    move || {
        log.lock().unwrap().push(name);
        Err(GuardError::FileSystem(format!("{} exploded", name)))
    }
}

fn ran(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

// =============================================================================
// Default mode (policy unset)
// =============================================================================

#[test]
fn test_default_mode_runs_in_reverse_insertion_order() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", false, ok(&log, "A"));
    rm.add_action("B", false, ok(&log, "B"));
    rm.add_action("C", false, ok(&log, "C"));

    rm.execute().unwrap();

    assert_eq!(ran(&log), vec!["C", "B", "A"]);
    let report = rm.last_report().unwrap();
    assert_eq!(report.mode, RollbackMode::BestEffort);
    assert_eq!(report.executed_ids(), vec![2, 1, 0]);
    assert!(report.is_clean());
}

#[test]
fn test_default_mode_runs_critical_phase_first() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", true, ok(&log, "A"));
    rm.add_action("B", false, ok(&log, "B"));
    rm.add_action("C", true, ok(&log, "C"));
    rm.add_action("D", false, ok(&log, "D"));

    rm.execute().unwrap();

    assert_eq!(ran(&log), vec!["C", "A", "D", "B"]);
}

#[test]
fn test_default_mode_continues_after_critical_failure() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", true, ok(&log, "A"));
    rm.add_action("B", false, ok(&log, "B"));
    rm.add_action("C", true, fail(&log, "C"));

    let err = rm.execute().unwrap_err();

    assert_eq!(ran(&log), vec!["C", "A", "B"]);
    match err {
        GuardError::Rollback { failures } => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].starts_with("C: "));
            assert!(failures[0].contains("C exploded"));
        }
        other => panic!("expected aggregate rollback error, got {other:?}"),
    }
}

#[test]
fn test_default_mode_aggregates_every_failure() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", false, fail(&log, "A"));
    rm.add_action("B", true, fail(&log, "B"));
    rm.add_action("C", false, ok(&log, "C"));

    let err = rm.execute().unwrap_err();

    assert_eq!(ran(&log), vec!["B", "C", "A"]);
    assert!(err.to_string().starts_with("rollback completed with 2 errors"));
    assert_eq!(err.exit_code(), crate::exit_codes::ROLLBACK_FAILURE);
}

#[test]
fn test_worktree_failure_still_deletes_branch_by_default() {
    let resource = Arc::new(MockResource::failing_worktree("/wt"));
    let mut rm = RollbackManager::new(resource.clone());
    rm.add_worktree_cleanup("/wt");
    rm.add_branch_cleanup("b");

    let err = rm.execute().unwrap_err();

    assert!(matches!(err, GuardError::Rollback { .. }));
    assert!(err.to_string().contains("Remove worktree at /wt"));
    assert_eq!(resource.calls(), vec!["worktree /wt", "branch b"]);
}

#[test]
fn test_default_mode_skips_dependents_of_failed_operation() {
    let log = Log::default();
    let mut rm = manager();
    let x = rm.add_action("X", false, ok(&log, "X"));
    let y = rm.add_action("Y", true, fail(&log, "Y"));
    rm.add_dependency(x, y).unwrap();

    let err = rm.execute().unwrap_err();

    assert_eq!(ran(&log), vec!["Y"]);
    let report = rm.last_report().unwrap();
    assert_eq!(
        report.outcome(x),
        Some(&OperationOutcome::SkippedByDependency { dependency: y })
    );
    assert_eq!(report.skipped(), 1);
    // Only the failure itself counts as an error.
    match err {
        GuardError::Rollback { failures } => assert_eq!(failures.len(), 1),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_skips_propagate_transitively() {
    let log = Log::default();
    let mut rm = manager();
    let z = rm.add_action("Z", false, ok(&log, "Z"));
    let x = rm.add_action("X", false, ok(&log, "X"));
    let y = rm.add_action("Y", true, fail(&log, "Y"));
    let other = rm.add_action("other", false, ok(&log, "other"));
    rm.add_dependency(x, y).unwrap();
    rm.add_dependency(z, x).unwrap();

    rm.execute().unwrap_err();

    assert_eq!(ran(&log), vec!["Y", "other"]);
    let report = rm.last_report().unwrap();
    assert_eq!(
        report.outcome(z),
        Some(&OperationOutcome::SkippedByDependency { dependency: x })
    );
    assert_eq!(report.outcome(other), Some(&OperationOutcome::Succeeded));
}

// =============================================================================
// Strict mode (explicit fail-fast)
// =============================================================================

#[test]
fn test_explicit_fail_fast_aborts_on_critical_failure() {
    let resource = Arc::new(MockResource::failing_worktree("/wt"));
    let mut rm = RollbackManager::new(resource.clone());
    rm.add_worktree_cleanup("/wt");
    rm.add_branch_cleanup("b");
    rm.set_fail_fast(true);

    let err = rm.execute().unwrap_err();

    assert!(err.is_critical_rollback());
    assert!(err.to_string().contains("critical rollback operation failed"));
    assert!(err.to_string().contains("Remove worktree at /wt"));
    assert_eq!(resource.calls(), vec!["worktree /wt"]);
    assert!(!rm.has_operations());
    assert!(rm.last_report().unwrap().aborted);
}

#[test]
fn test_explicit_fail_fast_never_runs_earlier_operations() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", true, ok(&log, "A"));
    rm.add_action("B", false, ok(&log, "B"));
    rm.add_action("C", true, fail(&log, "C"));
    rm.add_action("D", true, ok(&log, "D"));
    rm.set_fail_fast(true);

    let err = rm.execute().unwrap_err();

    assert_eq!(ran(&log), vec!["D", "C"]);
    match err {
        GuardError::CriticalRollback { operation, cause } => {
            assert_eq!(operation, "C");
            assert!(cause.contains("C exploded"));
        }
        other => panic!("expected critical rollback error, got {other:?}"),
    }
}

#[test]
fn test_explicit_fail_fast_without_failures_runs_everything() {
    let log = Log::default();
    let mut rm = manager().with_policy(FailFastPolicy::Explicit(true));
    rm.add_action("A", false, ok(&log, "A"));
    rm.add_action("B", true, ok(&log, "B"));
    rm.add_action("C", false, fail(&log, "C"));

    let err = rm.execute().unwrap_err();

    // Non-critical failures never abort.
    assert_eq!(ran(&log), vec!["B", "C", "A"]);
    assert!(matches!(err, GuardError::Rollback { .. }));
    assert_eq!(rm.last_report().unwrap().mode, RollbackMode::Strict);
}

// =============================================================================
// Dependency-graph mode (explicit fail-fast disabled)
// =============================================================================

#[test]
fn test_graph_mode_ignores_criticality() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", true, ok(&log, "A"));
    rm.add_action("B", false, ok(&log, "B"));
    rm.add_action("C", true, ok(&log, "C"));
    rm.set_fail_fast(false);

    rm.execute().unwrap();

    assert_eq!(ran(&log), vec!["C", "B", "A"]);
    assert_eq!(
        rm.last_report().unwrap().mode,
        RollbackMode::DependencyGraph
    );
}

#[test]
fn test_graph_mode_waits_for_dependencies() {
    let log = Log::default();
    let mut rm = manager();
    let first = rm.add_action("first", false, ok(&log, "first"));
    let second = rm.add_action("second", false, ok(&log, "second"));
    rm.add_dependency(second, first).unwrap();
    rm.set_fail_fast(false);

    rm.execute().unwrap();

    assert_eq!(ran(&log), vec!["first", "second"]);
}

#[test]
fn test_graph_mode_critical_failure_does_not_abort() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", false, ok(&log, "A"));
    rm.add_action("B", true, fail(&log, "B"));
    rm.set_fail_fast(false);

    let err = rm.execute().unwrap_err();

    assert_eq!(ran(&log), vec!["B", "A"]);
    assert!(!err.is_critical_rollback());
}

#[test]
fn test_graph_mode_never_runs_dependents_of_failures() {
    let log = Log::default();
    let mut rm = manager();
    let base = rm.add_action("base", false, fail(&log, "base"));
    let dependent = rm.add_action("dependent", false, ok(&log, "dependent"));
    let grandchild = rm.add_action("grandchild", false, ok(&log, "grandchild"));
    rm.add_dependency(dependent, base).unwrap();
    rm.add_dependency(grandchild, dependent).unwrap();
    rm.set_fail_fast(false);

    let err = rm.execute().unwrap_err();

    assert_eq!(ran(&log), vec!["base"]);
    let report = rm.last_report().unwrap();
    assert_eq!(
        report.outcome(dependent),
        Some(&OperationOutcome::SkippedByDependency { dependency: base })
    );
    assert_eq!(
        report.outcome(grandchild),
        Some(&OperationOutcome::SkippedByDependency { dependency: dependent })
    );
    match err {
        GuardError::Rollback { failures } => assert_eq!(failures.len(), 1),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_graph_mode_reports_cycles_as_dependency_constraints() {
    let log = Log::default();
    let mut rm = manager();
    let a = rm.add_action("A", false, ok(&log, "A"));
    let b = rm.add_action("B", false, ok(&log, "B"));
    rm.add_action("free", false, ok(&log, "free"));
    rm.add_dependency(a, b).unwrap();
    rm.add_dependency(b, a).unwrap();
    rm.set_fail_fast(false);

    let err = rm.execute().unwrap_err();

    assert_eq!(ran(&log), vec!["free"]);
    let report = rm.last_report().unwrap();
    assert_eq!(report.outcome(a), Some(&OperationOutcome::SkippedByCycle));
    assert_eq!(report.outcome(b), Some(&OperationOutcome::SkippedByCycle));

    match err {
        GuardError::Rollback { failures } => {
            assert_eq!(failures.len(), 2);
            assert!(failures.iter().all(|f| f.contains("dependency constraints")));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(rm.last_error().unwrap().cause, DEPENDENCY_CONSTRAINT);
}

#[test]
fn test_graph_mode_self_dependency_is_a_cycle() {
    let log = Log::default();
    let mut rm = manager();
    let a = rm.add_action("A", false, ok(&log, "A"));
    rm.add_dependency(a, a).unwrap();
    rm.set_fail_fast(false);

    rm.execute().unwrap_err();

    assert!(ran(&log).is_empty());
    assert_eq!(
        rm.last_report().unwrap().outcome(a),
        Some(&OperationOutcome::SkippedByCycle)
    );
}

// =============================================================================
// Ledger lifecycle
// =============================================================================

#[test]
fn test_execute_clears_ledger_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let mut rm = manager();
    {
        let runs = Arc::clone(&runs);
        rm.add_action("count", true, move || {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    rm.execute().unwrap();
    assert!(!rm.has_operations());
    rm.execute().unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_execute_also_clears_ledger() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", true, fail(&log, "A"));

    rm.execute().unwrap_err();
    assert!(!rm.has_operations());

    rm.execute().unwrap();
    assert_eq!(ran(&log), vec!["A"]);
}

#[test]
fn test_clear_discards_without_running() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("A", true, ok(&log, "A"));
    rm.add_action("B", false, ok(&log, "B"));

    rm.clear();
    rm.execute().unwrap();

    assert!(ran(&log).is_empty());
    assert!(!rm.has_operations());
    assert!(rm.last_report().is_none());
}

#[test]
fn test_ids_restart_after_clear() {
    let mut rm = manager();
    assert_eq!(rm.add_branch_cleanup("a"), 0);
    assert_eq!(rm.add_branch_cleanup("b"), 1);
    rm.clear();
    assert_eq!(rm.add_branch_cleanup("c"), 0);
    assert_eq!(rm.dependents_of(0), &[] as &[usize]);
}

#[test]
fn test_last_error_survives_clear_and_clean_runs() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("broken", false, fail(&log, "broken"));
    rm.execute().unwrap_err();

    let expected = RollbackFailure {
        operation: "broken".to_string(),
        cause: "filesystem error: broken exploded".to_string(),
    };
    assert_eq!(rm.last_error(), Some(&expected));

    rm.clear();
    rm.add_action("fine", false, ok(&log, "fine"));
    rm.execute().unwrap();

    assert_eq!(rm.last_error(), Some(&expected));
    assert_eq!(
        rm.last_error().unwrap().to_string(),
        "broken: filesystem error: broken exploded"
    );
}

#[test]
fn test_last_error_is_most_recent_failure() {
    let log = Log::default();
    let mut rm = manager();
    rm.add_action("first", false, fail(&log, "first"));
    rm.add_action("second", false, fail(&log, "second"));

    rm.execute().unwrap_err();

    // "second" runs first, so "first" fails last.
    assert_eq!(rm.last_error().unwrap().operation, "first");
}

#[test]
fn test_add_dependency_rejects_unknown_ids() {
    let mut rm = manager();
    let a = rm.add_branch_cleanup("a");

    let err = rm.add_dependency(a, 7).unwrap_err();
    assert!(matches!(err, GuardError::Validation(_)));
    assert!(err.to_string().contains("unknown rollback operation id 7"));

    assert!(rm.add_dependency(3, a).is_err());
}

#[test]
fn test_add_dependency_records_both_directions_once() {
    let mut rm = manager();
    let worktree = rm.add_worktree_cleanup("/wt");
    let branch = rm.add_branch_cleanup("b");

    rm.add_dependency(branch, worktree).unwrap();
    rm.add_dependency(branch, worktree).unwrap();

    assert_eq!(rm.operations()[branch].depends_on(), &[worktree]);
    assert_eq!(rm.dependents_of(worktree), &[branch]);
}

#[test]
fn test_descriptions_and_kinds() {
    let mut rm = manager();
    rm.add_worktree_cleanup("/wt");
    rm.add_branch_cleanup("feature/x");
    rm.add_file_cleanup("/tmp/x");
    rm.add_link_cleanup(vec![PathBuf::from("/l1"), PathBuf::from("/l2")]);
    rm.add_action("Restore config", false, || Ok(()));

    assert!(rm.has_operations());
    assert_eq!(
        rm.operation_descriptions(),
        vec![
            "Remove worktree at /wt",
            "Delete branch feature/x",
            "Remove files at /tmp/x",
            "Remove 2 symbolic links",
            "Restore config",
        ]
    );

    let ops = rm.operations();
    let kinds: Vec<&str> = ops.iter().map(|op| op.kind().as_str()).collect();
    assert_eq!(
        kinds,
        vec![
            "remove_worktree",
            "delete_branch",
            "remove_files",
            "cleanup_links",
            "custom"
        ]
    );
    let critical: Vec<bool> = ops.iter().map(RollbackOperation::is_critical).collect();
    assert_eq!(critical, vec![true, false, true, false, false]);
    assert!(ops.iter().enumerate().all(|(i, op)| op.id() == i));
}

#[test]
fn test_policy_from_config() {
    let config = crate::config::Config::from_yaml("rollback_fail_fast: false").unwrap();
    let rm = manager().with_policy(config.fail_fast_policy());
    assert_eq!(rm.fail_fast_policy(), FailFastPolicy::Explicit(false));

    let rm = manager();
    assert_eq!(rm.fail_fast_policy(), FailFastPolicy::Unset);
}

#[test]
fn test_empty_ledger_execute_is_noop() {
    let mut rm = manager();
    rm.set_fail_fast(true);
    rm.execute().unwrap();
    assert!(rm.last_report().is_none());
    assert!(rm.last_error().is_none());
}

// =============================================================================
// Filesystem and git compensations
// =============================================================================

#[test]
fn test_file_cleanup_removes_tree() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("generated");
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    std::fs::write(dir.join("sub").join("file.txt"), "data").unwrap();

    let mut rm = manager();
    rm.add_file_cleanup(&dir);
    rm.execute().unwrap();

    assert!(!dir.exists());
}

#[cfg(unix)]
#[test]
fn test_link_cleanup_removes_links() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("shared.env");
    std::fs::write(&target, "KEY=value").unwrap();
    let link = temp.path().join("linked.env");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let mut rm = manager();
    rm.add_link_cleanup(vec![link.clone()]);
    rm.execute().unwrap();

    assert!(std::fs::symlink_metadata(&link).is_err());
    assert!(target.exists());
}

#[test]
fn test_git_resource_undoes_worktree_creation() {
    use crate::test_support::{add_worktree, create_test_repo};

    let repo_dir = create_test_repo();
    let repo = repo_dir.path();
    let worktree = add_worktree(repo, "task-1");
    let links_dir = TempDir::new().unwrap();
    let notes = links_dir.path().join("notes.md");
    std::fs::write(&notes, "scratch").unwrap();

    let mut rm = RollbackManager::new(Arc::new(GitResource::new(repo)));
    let branch = rm.add_branch_cleanup("task-1");
    let wt = rm.add_worktree_cleanup(&worktree);
    rm.add_file_cleanup(&notes);
    rm.add_dependency(branch, wt).unwrap();

    rm.execute().unwrap();

    assert!(!worktree.exists());
    assert!(!notes.exists());
    assert!(!crate::git::branch_exists(repo, "task-1").unwrap());
}

#[test]
fn test_git_resource_branch_survives_failed_worktree_removal() {
    use crate::test_support::create_test_repo;

    let repo_dir = create_test_repo();
    let repo = repo_dir.path();
    crate::git::run_git(repo, &["branch", "orphan"]).unwrap();

    let mut rm = RollbackManager::new(Arc::new(GitResource::new(repo)));
    let branch = rm.add_branch_cleanup("orphan");
    let wt = rm.add_worktree_cleanup(repo.join("never-created"));
    rm.add_dependency(branch, wt).unwrap();

    let err = rm.execute().unwrap_err();

    assert!(matches!(err, GuardError::Rollback { .. }));
    assert!(crate::git::branch_exists(repo, "orphan").unwrap());
}
