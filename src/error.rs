use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by store and tree operations.
///
/// Access checks never produce these: the resolver answers `false` for
/// missing or deleted documents instead of failing. There is deliberately no
/// `PermissionDenied` variant either; the core only answers boolean and
/// summary queries, and turning a denial into a rejected request is the
/// caller's job.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("document '{0}' not found")]
    NotFound(Uuid),
    #[error("parent '{0}' not found")]
    ParentNotFound(Uuid),
    #[error("{0}")]
    InvalidOperation(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DriveError>;
