//! Default values for configuration fields.

use std::path::PathBuf;

/// Name of the shared lock directory under the platform temp location.
pub const LOCK_DIR_NAME: &str = "wtree-locks";

/// Platform default for the machine-wide lock directory.
///
/// All cooperating processes must agree on this location.
pub fn default_lock_dir() -> PathBuf {
    if cfg!(windows) {
        std::env::temp_dir().join(LOCK_DIR_NAME)
    } else {
        PathBuf::from("/tmp").join(LOCK_DIR_NAME)
    }
}

// Default value functions for serde
pub(crate) fn default_lock_timeout_secs() -> u64 {
    30
}
pub(crate) fn default_lock_retry_interval_ms() -> u64 {
    100
}
