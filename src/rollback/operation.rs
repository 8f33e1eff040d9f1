//! Ledger entries.

use crate::error::Result;
use std::fmt;

/// A compensating action. Runs at most once.
pub type RollbackAction = Box<dyn FnOnce() -> Result<()> + Send>;

/// What a compensating action undoes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackKind {
    RemoveWorktree,
    DeleteBranch,
    RemoveFiles,
    CleanupLinks,
    /// Caller-supplied action registered through `add_action`.
    Custom,
}

impl RollbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackKind::RemoveWorktree => "remove_worktree",
            RollbackKind::DeleteBranch => "delete_branch",
            RollbackKind::RemoveFiles => "remove_files",
            RollbackKind::CleanupLinks => "cleanup_links",
            RollbackKind::Custom => "custom",
        }
    }
}

impl fmt::Display for RollbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the rollback ledger.
///
/// Everything but the dependency list is fixed once the operation is
/// appended.
pub struct RollbackOperation {
    pub(crate) id: usize,
    pub(crate) kind: RollbackKind,
    pub(crate) description: String,
    pub(crate) critical: bool,
    pub(crate) depends_on: Vec<usize>,
    pub(crate) action: Option<RollbackAction>,
}

impl RollbackOperation {
    pub(crate) fn new(
        id: usize,
        kind: RollbackKind,
        description: String,
        critical: bool,
        action: RollbackAction,
    ) -> Self {
        Self {
            id,
            kind,
            description,
            critical,
            depends_on: Vec::new(),
            action: Some(action),
        }
    }

    /// Stable id: the insertion position in the ledger.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn kind(&self) -> &RollbackKind {
        &self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// Ids whose compensation must not have failed for this one to run.
    pub fn depends_on(&self) -> &[usize] {
        &self.depends_on
    }

    /// Run the action. A second call reports an error instead of running twice.
    pub(crate) fn run(&mut self) -> std::result::Result<(), String> {
        match self.action.take() {
            Some(action) => action().map_err(|e| e.to_string()),
            None => Err("action already executed".to_string()),
        }
    }
}

impl fmt::Debug for RollbackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollbackOperation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("critical", &self.critical)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}
