use thiserror::Error;

/// Errors surfaced by session operations. `Validation`, `NotAuthorized`,
/// `RoomNotFound` and `RoomFull` are reported back to the offending
/// sender; `StateConflict` marks a command that raced a transition which
/// already happened and is dropped after logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("external service failure: {0}")]
    ExternalService(String),
    #[error("conflicting state: {0}")]
    StateConflict(String),
}

impl SessionError {
    /// Conflicts are no-ops by contract; everything else is answered with
    /// an error message to the sender.
    pub fn is_silent(&self) -> bool {
        matches!(self, SessionError::StateConflict(_))
    }
}
