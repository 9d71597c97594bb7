use crate::models::EntryId;
use thiserror::Error;

/// A structural mutation the tree refused. Nothing was applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum StructuralConflict {
    #[error("entry {0} not found")]
    NotFound(EntryId),

    #[error("entry id {0} is already in use")]
    DuplicateId(EntryId),

    #[error("cannot move {id} into its own subtree (target parent {parent})")]
    SelfParenting { id: EntryId, parent: EntryId },

    #[error("position {position} already taken under {parent}")]
    DuplicatePosition { parent: EntryId, position: f64 },

    #[error("the root entry cannot be edited, moved or deleted")]
    RootImmutable,

    #[error("position {0} is not a finite number")]
    InvalidPosition(f64),

    #[error("entry {0} has no previous entry to merge into or indent under")]
    NoPreviousEntry(EntryId),
}

/// Errors surfaced by the outline orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum OutlineError {
    #[error(transparent)]
    Conflict(#[from] StructuralConflict),

    #[error("a drag session is already active")]
    DragInProgress,

    #[error("no drag session is active")]
    NoDragSession,

    #[error("invalid outline snapshot: {0}")]
    Snapshot(String),
}

pub(crate) type OutlineResult<T> = Result<T, OutlineError>;
