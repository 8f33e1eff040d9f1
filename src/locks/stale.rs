//! Stale-lock observation and reclamation.

use super::liveness::process_alive;
use super::record::LockRecord;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// How long a freshly created lock file without a readable pid is given
/// before it counts as stale. Covers the window between exclusive create
/// and the record write.
pub(crate) const RECORD_WRITE_GRACE: Duration = Duration::from_millis(500);

/// Snapshot of a lock file taken while deciding whether it is stale.
#[derive(Debug, Clone)]
pub(crate) struct Observation {
    /// Raw file content, compared again before removal.
    pub raw: Vec<u8>,
    pub record: LockRecord,
    pub stale: bool,
}

/// Read the lock file at `path` and decide whether its holder is gone.
///
/// A record naming a dead pid is stale. A record without a usable pid,
/// including content that is not valid UTF-8, is stale once the file is
/// older than [`RECORD_WRITE_GRACE`].
pub(crate) fn observe(path: &Path) -> io::Result<Observation> {
    let raw = fs::read(path)?;
    let record = LockRecord::parse(&String::from_utf8_lossy(&raw));

    let stale = match record.pid {
        Some(pid) => !process_alive(pid),
        None => file_age(path)? >= RECORD_WRITE_GRACE,
    };

    Ok(Observation { raw, record, stale })
}

/// Remove a stale lock file, but only if it still holds the observed content.
///
/// Returns `Ok(true)` when this call removed the file, `Ok(false)` when the
/// file vanished or was replaced by a new holder in the meantime.
pub(crate) fn reclaim(path: &Path, observed: &Observation) -> io::Result<bool> {
    match fs::read(path) {
        Ok(current) if current == observed.raw => {}
        Ok(_) => return Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn file_age(path: &Path) -> io::Result<Duration> {
    let modified = fs::metadata(path)?.modified()?;
    // A clock that moved backwards reads as "just written".
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}
