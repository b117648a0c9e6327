use thiserror::Error;

/// Result type alias used throughout the core and its satellite crates.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The stable error taxonomy for the orchestrator core.
///
/// Every public service method declares (in its doc comment) which of these
/// it may surface; callers are expected to match on variants rather than on
/// rendered messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// The requested entity does not exist (or not for this tenant).
    #[error("not found: {0}")]
    NotFound(String),

    /// An optimistic-concurrency guard (`WHERE status = $expected`, a row
    /// version check) did not match; the caller should re-read and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requested state transition is not reachable from the entity's
    /// current state.
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// `RetryTask` was called on a task whose `retry_count` already equals
    /// `max_retries`.
    #[error("retries exhausted: {retry_count}/{max_retries}")]
    RetriesExhausted { retry_count: u32, max_retries: u32 },

    /// The caller's deadline elapsed before (or during) the operation.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The caller's role does not authorize the requested operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A document or section lock is held by another agent.
    #[error("locked: {0}")]
    Locked(String),

    /// The caller attempted to release or extend a lock it does not own.
    #[error("not owner: {0}")]
    NotOwner(String),

    /// The caller's lease has already expired.
    #[error("expired: {0}")]
    Expired(String),

    /// Input failed validation before any write was attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// Catch-all for failures that do not fit a more specific taxonomy
    /// (typically wrapped I/O or storage errors from the satellite crates).
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: impl std::fmt::Display, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id} not found"))
    }

    pub fn illegal_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::IllegalTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("field '{field}' cannot be empty"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, CoreError::Locked(_))
    }

    /// HTTP-status-equivalent for callers that want one; the core itself
    /// exposes no transport, this is purely a convenience mapping.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::NotFound(_) => 404,
            CoreError::Conflict(_) => 409,
            CoreError::IllegalTransition { .. } => 422,
            CoreError::RetriesExhausted { .. } => 422,
            CoreError::DeadlineExceeded => 504,
            CoreError::PermissionDenied(_) => 403,
            CoreError::Locked(_) => 423,
            CoreError::NotOwner(_) => 403,
            CoreError::Expired(_) => 410,
            CoreError::Validation(_) => 400,
            CoreError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_produce_expected_variants() {
        let err = CoreError::not_found("task", 42);
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);

        let err = CoreError::illegal_transition("Pending", "Completed");
        assert_eq!(
            err,
            CoreError::IllegalTransition {
                from: "Pending".into(),
                to: "Completed".into(),
            }
        );
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn predicates_are_mutually_exclusive() {
        let err = CoreError::Locked("doc:1".into());
        assert!(err.is_locked());
        assert!(!err.is_not_found());
        assert!(!err.is_validation());
    }
}
