//! Process-local lock manager.

use super::handle::{DEFAULT_RETRY_INTERVAL, OperationLock};
use super::key::{LockKey, normalize_target};
use super::types::LockKind;
use crate::config::Config;
use crate::config::types::default_lock_dir;
use crate::error::{GuardError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Hands out operation locks in a shared lock directory and tracks the ones
/// this process holds.
///
/// Cross-process exclusion comes only from the lock files. The in-memory
/// table exists so the same process cannot acquire one key twice, and so
/// [`LockManager::release_all`] can clean up at shutdown.
#[derive(Debug)]
pub struct LockManager {
    lock_dir: PathBuf,
    retry_interval: Duration,
    locks: Mutex<HashMap<LockKey, OperationLock>>,
}

impl LockManager {
    /// Create a manager for `lock_dir`, creating the directory if needed.
    ///
    /// Fails when the directory cannot be created; callers decide whether
    /// to continue without protection.
    pub fn new<P: Into<PathBuf>>(lock_dir: P) -> Result<Self> {
        let lock_dir = lock_dir.into();
        ensure_lock_dir(&lock_dir)?;
        Ok(Self {
            lock_dir,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Create a manager for the platform default lock directory.
    pub fn with_default_dir() -> Result<Self> {
        Self::new(default_lock_dir())
    }

    /// Create a manager from configuration (lock directory and retry interval).
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.lock_dir())?.with_retry_interval(config.retry_interval()))
    }

    /// Override the delay between acquisition attempts.
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Acquire the lock for `kind` on `target`, waiting up to `timeout`.
    ///
    /// Fails immediately with a validation error if this process already
    /// holds the same lock. Otherwise polls the lock file until it can be
    /// created, reclaiming it if its holder has died, and fails with a
    /// timeout error naming the holder when the time runs out.
    ///
    /// A lock file without a usable pid (empty, garbage, or not UTF-8) is
    /// only reclaimed once it is older than the 500 ms record-write grace,
    /// so reclaiming a freshly written one needs a `timeout` longer than that.
    pub fn acquire_lock<P: AsRef<Path>>(
        &self,
        kind: LockKind,
        target: P,
        timeout: Duration,
    ) -> Result<OperationLock> {
        let target = normalize_target(target.as_ref())?;
        let key = LockKey::from_normalized(&kind, &target);

        {
            let mut locks = self.table();
            if let Some(existing) = locks.get(&key) {
                if existing.is_acquired() {
                    return Err(GuardError::Validation(format!(
                        "lock already acquired for {} on {}",
                        kind,
                        target.display()
                    )));
                }
                // Released directly through the handle; forget it.
                locks.remove(&key);
            }
        }

        ensure_lock_dir(&self.lock_dir)?;

        let lock = OperationLock::new(
            &self.lock_dir,
            key.clone(),
            kind,
            target,
            timeout,
            self.retry_interval,
        );
        debug!(lock = %key, timeout_ms = timeout.as_millis() as u64, "acquiring lock");
        lock.acquire()?;

        self.table().insert(key, lock.clone());
        info!(
            kind = %lock.kind(),
            target = %lock.target().display(),
            path = %lock.path().display(),
            "acquired lock"
        );
        Ok(lock)
    }

    /// Release a lock previously returned by [`LockManager::acquire_lock`].
    ///
    /// Idempotent: releasing an already released handle returns `Ok(())`.
    pub fn release_lock(&self, lock: &OperationLock) -> Result<()> {
        {
            let mut locks = self.table();
            if locks
                .get(lock.key())
                .is_some_and(|tracked| tracked.same_handle(lock))
            {
                locks.remove(lock.key());
            }
        }

        let was_acquired = lock.is_acquired();
        lock.release()?;
        if was_acquired {
            info!(kind = %lock.kind(), target = %lock.target().display(), "released lock");
        }
        Ok(())
    }

    /// Release every lock this manager tracks.
    ///
    /// Keeps going after failures and reports all of them together.
    pub fn release_all(&self) -> Result<()> {
        let drained: Vec<OperationLock> = self.table().drain().map(|(_, lock)| lock).collect();

        let mut failures = Vec::new();
        for lock in &drained {
            if let Err(e) = lock.release() {
                failures.push(format!("{}: {}", lock.key(), e));
            }
        }

        if !drained.is_empty() {
            info!(
                released = drained.len() - failures.len(),
                failed = failures.len(),
                "released all locks"
            );
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(GuardError::LockRelease { failures })
        }
    }

    /// Number of locks currently tracked as held by this process.
    pub fn held_count(&self) -> usize {
        self.table().values().filter(|l| l.is_acquired()).count()
    }

    /// Whether this process currently holds the lock for `kind` on `target`.
    pub fn is_held<P: AsRef<Path>>(&self, kind: &LockKind, target: P) -> bool {
        let Ok(key) = LockKey::new(kind, target.as_ref()) else {
            return false;
        };
        self.table().get(&key).is_some_and(|l| l.is_acquired())
    }

    fn table(&self) -> MutexGuard<'_, HashMap<LockKey, OperationLock>> {
        self.locks.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Create the lock directory if it does not exist.
pub(crate) fn ensure_lock_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder.create(dir).map_err(|e| {
        GuardError::FileSystem(format!(
            "failed to create lock directory '{}': {}",
            dir.display(),
            e
        ))
    })
}
