//! Operation lock handle.

use super::key::LockKey;
use super::record::LockRecord;
use super::stale::{observe, reclaim};
use super::types::LockKind;
use crate::error::{GuardError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default delay between acquisition attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a lock file for one `(kind, target)` pair.
///
/// Handles are single-use: once released, acquiring again needs a new
/// handle from [`LockManager::acquire_lock`](super::LockManager::acquire_lock).
/// Clones share state; the lock file is removed when the last clone is
/// dropped if it was never released explicitly.
#[derive(Debug, Clone)]
pub struct OperationLock {
    inner: Arc<LockInner>,
}

#[derive(Debug)]
struct LockInner {
    key: LockKey,
    path: PathBuf,
    kind: LockKind,
    target: PathBuf,
    pid: u32,
    timeout: Duration,
    retry_interval: Duration,
    state: Mutex<LockState>,
}

#[derive(Debug, Default)]
struct LockState {
    file: Option<File>,
    acquired: bool,
    /// Set once the handle has been released; a released handle never re-acquires.
    spent: bool,
}

impl OperationLock {
    pub(crate) fn new(
        lock_dir: &Path,
        key: LockKey,
        kind: LockKind,
        target: PathBuf,
        timeout: Duration,
        retry_interval: Duration,
    ) -> Self {
        let path = lock_dir.join(key.file_name());
        Self {
            inner: Arc::new(LockInner {
                key,
                path,
                kind,
                target,
                pid: std::process::id(),
                timeout,
                retry_interval,
                state: Mutex::new(LockState::default()),
            }),
        }
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn key(&self) -> &LockKey {
        &self.inner.key
    }

    pub fn kind(&self) -> &LockKind {
        &self.inner.kind
    }

    /// The normalized target this lock protects.
    pub fn target(&self) -> &Path {
        &self.inner.target
    }

    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn retry_interval(&self) -> Duration {
        self.inner.retry_interval
    }

    /// Whether the lock is currently held through this handle.
    pub fn is_acquired(&self) -> bool {
        self.inner.state().acquired
    }

    /// Whether two values are clones of the same handle.
    pub(crate) fn same_handle(&self, other: &OperationLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Acquire the lock file, polling until the timeout elapses.
    ///
    /// The file is created with exclusive-create semantics, so the filesystem
    /// decides the winner between racing processes. While the file exists,
    /// each attempt checks whether the recorded holder is still alive and
    /// reclaims the file if it is not.
    pub(crate) fn acquire(&self) -> Result<()> {
        let inner = &*self.inner;
        let mut state = inner.state();

        if state.acquired || state.spent {
            return Err(GuardError::Validation(format!(
                "lock handle for {} on {} has already been used",
                inner.kind,
                inner.target.display()
            )));
        }

        let start = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match create_exclusive(&inner.path) {
                Ok(file) => {
                    let file = write_record(&inner.path, file, &inner.kind)?;
                    state.file = Some(file);
                    state.acquired = true;
                    debug!(
                        lock = %inner.key,
                        attempts,
                        waited_ms = start.elapsed().as_millis() as u64,
                        "lock file created"
                    );
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => {
                    return Err(GuardError::FileSystem(format!(
                        "failed to create lock file '{}': {}",
                        inner.path.display(),
                        e
                    )));
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= inner.timeout {
                let holder = observe(&inner.path)
                    .ok()
                    .filter(|o| !o.raw.trim_ascii().is_empty())
                    .map(|o| o.record.describe());
                return Err(GuardError::LockTimeout {
                    kind: inner.kind.to_string(),
                    target: inner.target.display().to_string(),
                    holder,
                });
            }

            match observe(&inner.path) {
                Ok(observed) if observed.stale => match reclaim(&inner.path, &observed) {
                    Ok(removed) => {
                        if removed {
                            debug!(
                                lock = %inner.key,
                                holder = %observed.record.describe(),
                                "reclaimed stale lock"
                            );
                        }
                        continue;
                    }
                    Err(e) => {
                        warn!(
                            lock = %inner.key,
                            error = %e,
                            "failed to remove stale lock file"
                        );
                    }
                },
                Ok(_) => {}
                // Released between our create attempt and the read.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    debug!(lock = %inner.key, error = %e, "could not inspect lock file");
                }
            }

            let remaining = inner.timeout.saturating_sub(elapsed);
            std::thread::sleep(inner.retry_interval.min(remaining));
        }
    }

    /// Release the lock: close the file handle and delete the lock file.
    ///
    /// Idempotent. Releasing a handle that is not (or no longer) acquired is
    /// a no-op.
    pub fn release(&self) -> Result<()> {
        let mut state = self.inner.state();
        if !state.acquired {
            state.spent = true;
            return Ok(());
        }
        let result = self.inner.cleanup(&mut state);
        state.acquired = false;
        state.spent = true;
        result
    }
}

impl LockInner {
    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Close the handle and remove the file, collecting both failures.
    fn cleanup(&self, state: &mut LockState) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(file) = state.file.take()
            && let Err(e) = file.sync_all()
        {
            errors.push(format!("failed to flush lock file: {}", e));
        }

        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            errors.push(format!("failed to remove lock file: {}", e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GuardError::FileSystem(format!(
                "lock cleanup errors for '{}': {}",
                self.path.display(),
                errors.join("; ")
            )))
        }
    }
}

impl Drop for LockInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poison| poison.into_inner());
        if !state.acquired {
            return;
        }
        state.acquired = false;
        state.file = None;
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to release lock on drop"
            );
        }
    }
}

/// Create the lock file, failing with `AlreadyExists` if it is present.
fn create_exclusive(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Write and flush the lock record; on failure remove the half-written file.
fn write_record(path: &Path, mut file: File, kind: &LockKind) -> Result<File> {
    let record = LockRecord::new(kind);

    let written = file
        .write_all(record.render().as_bytes())
        .and_then(|()| file.sync_all());

    if let Err(e) = written {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(GuardError::FileSystem(format!(
            "failed to write lock record '{}': {}",
            path.display(),
            e
        )));
    }

    Ok(file)
}
