//! Guarded execution of a multi-step operation.
//!
//! Ties the two halves together the way an executor uses them:
//!
//! 1. Acquire the lock for `(kind, target)`
//! 2. Start from an empty rollback ledger
//! 3. Run the step, which records a compensation after each side effect
//! 4. On failure, execute the ledger; on success, clear it
//! 5. Release the lock

use crate::error::Result;
use crate::locks::{LockKind, LockManager};
use crate::rollback::RollbackManager;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Run `step` while holding the lock for `kind` on `target`.
///
/// The step's own error is returned even if rollback or release fails
/// afterwards; those failures are logged. Critical rollback failures are
/// logged at error level, everything else at warn level. If the lock cannot
/// be acquired the step never runs.
pub fn run_guarded<T, P, F>(
    locks: &LockManager,
    rollback: &mut RollbackManager,
    kind: LockKind,
    target: P,
    timeout: Duration,
    step: F,
) -> Result<T>
where
    P: AsRef<Path>,
    F: FnOnce(&mut RollbackManager) -> Result<T>,
{
    let lock = locks.acquire_lock(kind, target, timeout)?;
    rollback.clear();

    let result = step(rollback);

    match &result {
        Ok(_) => {
            debug!(lock = %lock.key(), "operation succeeded; discarding rollback ledger");
            rollback.clear();
        }
        Err(e) => {
            warn!(
                kind = %lock.kind(),
                target = %lock.target().display(),
                error = %e,
                pending = rollback.operations().len(),
                "operation failed; rolling back"
            );
            match rollback.execute() {
                Ok(()) => {}
                Err(rollback_err) if rollback_err.is_critical_rollback() => {
                    error!(error = %rollback_err, "rollback aborted; manual cleanup required");
                }
                Err(rollback_err) => {
                    warn!(error = %rollback_err, "rollback incomplete");
                }
            }
        }
    }

    if let Err(e) = locks.release_lock(&lock) {
        warn!(lock = %lock.key(), error = %e, "failed to release lock");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardError;
    use crate::rollback::{RollbackManager, UndoableResource};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct NoopResource;

    impl UndoableResource for NoopResource {
        fn remove_worktree(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        fn delete_branch(&self, _branch: &str) -> Result<()> {
            Ok(())
        }
    }

    fn setup() -> (TempDir, LockManager, RollbackManager) {
        let temp = TempDir::new().unwrap();
        let locks = LockManager::new(temp.path().join("locks"))
            .unwrap()
            .with_retry_interval(Duration::from_millis(10));
        let rollback = RollbackManager::new(Arc::new(NoopResource));
        (temp, locks, rollback)
    }

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn fs_err(e: std::io::Error) -> GuardError {
        GuardError::FileSystem(e.to_string())
    }

    #[test]
    fn success_keeps_side_effects_and_releases_lock() {
        let (temp, locks, mut rollback) = setup();
        let created = temp.path().join("created");

        let value = run_guarded(
            &locks,
            &mut rollback,
            LockKind::Create,
            "/repo/ok",
            TIMEOUT,
            |rb| {
                std::fs::create_dir(&created).map_err(fs_err)?;
                rb.add_file_cleanup(&created);
                Ok(42)
            },
        )
        .unwrap();

        assert_eq!(value, 42);
        assert!(created.exists());
        assert!(!rollback.has_operations());
        assert!(!locks.is_held(&LockKind::Create, "/repo/ok"));
        assert!(std::fs::read_dir(locks.lock_dir()).unwrap().next().is_none());
    }

    #[test]
    fn failure_rolls_back_and_returns_step_error() {
        let (temp, locks, mut rollback) = setup();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        let order = Arc::new(Mutex::new(Vec::new()));

        let err = run_guarded(
            &locks,
            &mut rollback,
            LockKind::Create,
            "/repo/fail",
            TIMEOUT,
            |rb| -> Result<()> {
                for path in [&first, &second] {
                    std::fs::write(path, "x").map_err(fs_err)?;
                    rb.add_file_cleanup(path);
                    let order = Arc::clone(&order);
                    let name = path.file_name().unwrap().to_string_lossy().to_string();
                    rb.add_action(format!("note {}", name), false, move || {
                        order.lock().unwrap().push(name);
                        Ok(())
                    });
                }
                Err(GuardError::GitError("worktree add failed".to_string()))
            },
        )
        .unwrap_err();

        assert!(matches!(err, GuardError::GitError(_)));
        assert!(!first.exists());
        assert!(!second.exists());
        assert_eq!(*order.lock().unwrap(), vec!["second", "first"]);
        assert!(!locks.is_held(&LockKind::Create, "/repo/fail"));
    }

    #[test]
    fn rollback_failure_does_not_mask_step_error() {
        let (_temp, locks, mut rollback) = setup();
        rollback.set_fail_fast(true);

        let err = run_guarded(
            &locks,
            &mut rollback,
            LockKind::Merge,
            "/repo/critical",
            TIMEOUT,
            |rb| -> Result<()> {
                rb.add_action("undo merge", true, || {
                    Err(GuardError::FileSystem("disk full".to_string()))
                });
                Err(GuardError::UserError("merge conflict".to_string()))
            },
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "merge conflict");
        assert_eq!(rollback.last_error().unwrap().operation, "undo merge");
        assert!(!locks.is_held(&LockKind::Merge, "/repo/critical"));
    }

    #[test]
    fn lock_is_held_while_step_runs() {
        let (_temp, locks, mut rollback) = setup();

        run_guarded(
            &locks,
            &mut rollback,
            LockKind::Delete,
            "/repo/held",
            TIMEOUT,
            |_| {
                assert!(locks.is_held(&LockKind::Delete, "/repo/held"));
                let err = locks
                    .acquire_lock(LockKind::Delete, "/repo/held", TIMEOUT)
                    .unwrap_err();
                assert!(matches!(err, GuardError::Validation(_)));
                Ok(())
            },
        )
        .unwrap();
    }

    #[test]
    fn stale_ledger_entries_are_discarded_before_step() {
        let (_temp, locks, mut rollback) = setup();
        rollback.add_worktree_cleanup(PathBuf::from("/leftover"));

        run_guarded(
            &locks,
            &mut rollback,
            LockKind::Switch,
            "/repo/fresh",
            TIMEOUT,
            |rb| {
                assert!(!rb.has_operations());
                Ok(())
            },
        )
        .unwrap();
    }

    #[test]
    fn step_is_skipped_when_lock_is_busy() {
        let (temp, locks, mut rollback) = setup();
        let other = LockManager::new(temp.path().join("locks")).unwrap();
        let held = other
            .acquire_lock(LockKind::Cleanup, "/repo/busy", TIMEOUT)
            .unwrap();

        let mut ran = false;
        let err = run_guarded(
            &locks,
            &mut rollback,
            LockKind::Cleanup,
            "/repo/busy",
            Duration::from_millis(50),
            |_| {
                ran = true;
                Ok(())
            },
        )
        .unwrap_err();

        assert!(matches!(err, GuardError::LockTimeout { .. }));
        assert!(!ran);
        other.release_lock(&held).unwrap();
    }
}
