//! On-disk lock record.
//!
//! A lock file holds newline-separated `key=value` lines:
//!
//! ```text
//! pid=4242
//! operation=create
//! time=2026-10-17T09:30:00+00:00
//! owner=alice@build-host
//! ```
//!
//! Only `pid` matters for staleness; the other lines are diagnostics.
//! Unknown keys are ignored.

use super::types::LockKind;
use crate::error::{GuardError, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Parsed contents of a lock file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockRecord {
    /// Process ID of the lock holder. `None` when missing or unparsable.
    pub pid: Option<u32>,

    /// The operation kind the lock was taken for.
    pub operation: String,

    /// When the lock was acquired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Owner of the lock (e.g., `user@HOST`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl LockRecord {
    /// Create a record for the current process with the current timestamp.
    pub fn new(kind: &LockKind) -> Self {
        Self {
            pid: Some(std::process::id()),
            operation: kind.as_str().to_string(),
            time: Some(Utc::now()),
            owner: Some(get_owner_string()),
        }
    }

    /// Parse a record from lock file content.
    ///
    /// Never fails: malformed lines are skipped and a missing or invalid
    /// `pid` leaves [`LockRecord::pid`] as `None`.
    pub fn parse(content: &str) -> Self {
        let mut record = Self::default();

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "pid" => record.pid = value.parse::<u32>().ok().filter(|pid| *pid > 0),
                "operation" => record.operation = value.to_string(),
                "time" => {
                    record.time = DateTime::parse_from_rfc3339(value)
                        .ok()
                        .map(|t| t.with_timezone(&Utc))
                }
                "owner" if !value.is_empty() => record.owner = Some(value.to_string()),
                _ => {}
            }
        }

        record
    }

    /// Read and parse a record from a lock file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read(path.as_ref()).map_err(|e| {
            GuardError::FileSystem(format!(
                "failed to read lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self::parse(&String::from_utf8_lossy(&content)))
    }

    /// Render the record as lock file content.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(pid) = self.pid {
            out.push_str(&format!("pid={}\n", pid));
        }
        out.push_str(&format!("operation={}\n", self.operation));
        if let Some(time) = self.time {
            out.push_str(&format!(
                "time={}\n",
                time.to_rfc3339_opts(SecondsFormat::Secs, false)
            ));
        }
        if let Some(owner) = &self.owner {
            out.push_str(&format!("owner={}\n", owner));
        }
        out
    }

    /// Calculate the age of the lock, if the acquisition time is known.
    pub fn age(&self) -> Option<Duration> {
        self.time.map(|t| Utc::now().signed_duration_since(t))
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let Some(age) = self.age() else {
            return "unknown".to_string();
        };
        let seconds = age.num_seconds().max(0);
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m", minutes)
        } else {
            format!("{}s", seconds)
        }
    }

    /// One-line description of the holder for diagnostics.
    pub fn describe(&self) -> String {
        let mut parts = vec![match self.pid {
            Some(pid) => format!("pid {}", pid),
            None => "unknown pid".to_string(),
        }];
        if !self.operation.is_empty() {
            parts.push(format!("operation {}", self.operation));
        }
        if let Some(time) = self.time {
            parts.push(format!("since {}", time.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(owner) = &self.owner {
            parts.push(format!("owner {}", owner));
        }
        parts.join(", ")
    }
}

/// Get the owner string for lock records.
pub(crate) fn get_owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_describes_current_process() {
        let record = LockRecord::new(&LockKind::Create);
        assert_eq!(record.pid, Some(std::process::id()));
        assert_eq!(record.operation, "create");
        assert!(record.age().unwrap().num_minutes() < 1);
        assert!(record.owner.as_deref().unwrap().contains('@'));
    }

    #[test]
    fn rendered_record_has_key_value_lines() {
        let record = LockRecord::new(&LockKind::Merge);
        let content = record.render();

        assert!(content.contains(&format!("pid={}\n", std::process::id())));
        assert!(content.contains("operation=merge\n"));
        assert!(content.contains("time="));

        let parsed = LockRecord::parse(&content);
        assert_eq!(parsed.pid, record.pid);
        assert_eq!(parsed.operation, "merge");
        assert!(parsed.time.is_some());
    }

    #[test]
    fn from_file_tolerates_non_utf8() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("corrupt.lock");
        fs::write(&path, [b'p', b'i', b'd', b'=', 0xff, b'\n', 0x80]).unwrap();

        let record = LockRecord::from_file(&path).unwrap();
        assert_eq!(record.pid, None);
    }

    #[test]
    fn parse_tolerates_garbage() {
        let parsed = LockRecord::parse("not a lock file\n\x00\x01");
        assert_eq!(parsed, LockRecord::default());
    }

    #[test]
    fn invalid_pid_is_none() {
        assert_eq!(LockRecord::parse("pid=abc\n").pid, None);
        assert_eq!(LockRecord::parse("pid=-5\n").pid, None);
        assert_eq!(LockRecord::parse("pid=0\n").pid, None);
        assert_eq!(LockRecord::parse("operation=create\n").pid, None);
    }

    #[test]
    fn parse_accepts_foreign_time_offsets() {
        let parsed = LockRecord::parse("pid=7\noperation=delete\ntime=2024-01-02T03:04:05+02:00\n");
        assert_eq!(parsed.pid, Some(7));
        assert_eq!(
            parsed.time.unwrap().to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-01-02T01:04:05Z"
        );
    }

    #[test]
    fn age_string_scales_units() {
        let mut record = LockRecord::new(&LockKind::Create);
        assert!(record.age_string().ends_with('s'));

        record.time = Some(Utc::now() - Duration::minutes(5));
        assert_eq!(record.age_string(), "5m");

        record.time = Some(Utc::now() - Duration::hours(2));
        assert!(record.age_string().starts_with("2h"));

        record.time = Some(Utc::now() - Duration::days(3));
        assert!(record.age_string().starts_with("3d"));

        record.time = None;
        assert_eq!(record.age_string(), "unknown");
    }

    #[test]
    fn describe_includes_known_fields() {
        let record = LockRecord::parse("pid=99\noperation=switch\nowner=bob@box\n");
        assert_eq!(record.describe(), "pid 99, operation switch, owner bob@box");
        assert_eq!(LockRecord::default().describe(), "unknown pid");
    }

    #[test]
    fn get_owner_string_has_user_and_host() {
        let owner = get_owner_string();
        assert!(owner.contains('@'));
    }
}
