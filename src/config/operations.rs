//! Config loading, validation, and resolution.

use super::model::Config;
use crate::error::{GuardError, Result};
use std::path::Path;

/// Environment variable naming a config file when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "WTREE_GUARD_CONFIG";

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            GuardError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document; treat it as "all defaults".
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| GuardError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GuardError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lock_timeout_secs` must be positive
    /// - `lock_retry_interval_ms` must be positive and not exceed the timeout
    /// - `lock_dir`, when set, must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_secs == 0 {
            return Err(GuardError::UserError(
                "config validation failed: lock_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.lock_retry_interval_ms == 0 {
            return Err(GuardError::UserError(
                "config validation failed: lock_retry_interval_ms must be greater than 0"
                    .to_string(),
            ));
        }

        if self.retry_interval() > self.lock_timeout() {
            return Err(GuardError::UserError(format!(
                "config validation failed: lock_retry_interval_ms ({}) exceeds lock_timeout_secs ({}s)",
                self.lock_retry_interval_ms, self.lock_timeout_secs
            )));
        }

        if let Some(dir) = &self.lock_dir
            && dir.as_os_str().is_empty()
        {
            return Err(GuardError::UserError(
                "config validation failed: lock_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the effective configuration.
    ///
    /// Order: the explicit path (from `--config`), then the file named by
    /// `WTREE_GUARD_CONFIG`, then built-in defaults. An explicitly named file
    /// that cannot be loaded is an error.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}
