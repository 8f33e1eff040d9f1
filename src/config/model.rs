//! Config struct definition and default implementation.

use super::types::*;
use crate::rollback::FailFastPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for lock acquisition and rollback execution.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Shared lock directory. Falls back to the platform default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,

    /// Default acquisition timeout in seconds.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Delay between acquisition attempts in milliseconds.
    #[serde(default = "default_lock_retry_interval_ms")]
    pub lock_retry_interval_ms: u64,

    // =========================================================================
    // Rollback settings
    // =========================================================================
    /// `null`/absent keeps the default two-phase mode, `true` aborts on the
    /// first critical failure, `false` switches to dependency-graph mode.
    #[serde(default)]
    pub rollback_fail_fast: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_dir: None,
            lock_timeout_secs: default_lock_timeout_secs(),
            lock_retry_interval_ms: default_lock_retry_interval_ms(),
            rollback_fail_fast: None,
        }
    }
}

impl Config {
    /// Resolved lock directory.
    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(default_lock_dir)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }

    /// Rollback policy derived from `rollback_fail_fast`.
    pub fn fail_fast_policy(&self) -> FailFastPolicy {
        match self.rollback_fail_fast {
            None => FailFastPolicy::Unset,
            Some(value) => FailFastPolicy::Explicit(value),
        }
    }
}
