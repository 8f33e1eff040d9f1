//! Fail-fast policy and the execution mode it selects.

use std::fmt;

/// Whether rollback should stop on critical failures, and whether the caller
/// said so explicitly.
///
/// The default and an explicit `true` both mean "stop on critical failure"
/// in spirit, but they run differently: only an explicit `true` aborts on
/// the first critical failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailFastPolicy {
    /// Never set by the caller.
    #[default]
    Unset,
    /// Set through [`RollbackManager::set_fail_fast`](super::RollbackManager::set_fail_fast)
    /// or configuration.
    Explicit(bool),
}

impl FailFastPolicy {
    /// Effective fail-fast value (`true` unless explicitly disabled).
    pub fn is_fail_fast(self) -> bool {
        !matches!(self, FailFastPolicy::Explicit(false))
    }

    pub fn is_explicit(self) -> bool {
        matches!(self, FailFastPolicy::Explicit(_))
    }

    /// The execution mode this policy selects.
    pub fn mode(self) -> RollbackMode {
        match self {
            FailFastPolicy::Unset => RollbackMode::BestEffort,
            FailFastPolicy::Explicit(true) => RollbackMode::Strict,
            FailFastPolicy::Explicit(false) => RollbackMode::DependencyGraph,
        }
    }
}

/// How [`RollbackManager::execute`](super::RollbackManager::execute) walks the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackMode {
    /// Critical operations first, then the rest; keep going after failures.
    BestEffort,
    /// Like `BestEffort`, but abort on the first critical failure.
    Strict,
    /// Ignore criticality; run operations once their dependencies have run.
    DependencyGraph,
}

impl RollbackMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RollbackMode::BestEffort => "best-effort",
            RollbackMode::Strict => "strict",
            RollbackMode::DependencyGraph => "dependency-graph",
        }
    }
}

impl fmt::Display for RollbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
