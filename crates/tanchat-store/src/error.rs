//! Error types for the chat store

use crate::engine::EngineStatus;
use crate::slot::SlotError;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from the chat store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The engine could not be brought up: the snapshot is corrupt, the schema
    /// is incompatible, or the durable slot is unreadable. Only `reset()` recovers.
    #[error("Database unavailable: {0}")]
    Initialization(String),

    /// A repository call was issued before the engine reached `Ready`.
    #[error("Database not initialized (engine is {0})")]
    NotInitialized(EngineStatus),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Map a rusqlite error raised by `context`, keeping constraint failures distinct.
    pub(crate) fn sql(context: &str, err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                return StoreError::ConstraintViolation(format!("{}: {}", context, err));
            }
        }
        StoreError::Storage(format!("{}: {}", context, err))
    }
}

impl From<SlotError> for StoreError {
    fn from(err: SlotError) -> Self {
        StoreError::Storage(format!("durable slot: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_initialized_names_state() {
        let err = StoreError::NotInitialized(EngineStatus::Uninitialized);
        assert!(err.to_string().contains("uninitialized"));
    }

    #[test]
    fn slot_errors_become_storage_errors() {
        let err: StoreError = SlotError::InvalidKey("a/b".into()).into();
        assert!(matches!(err, StoreError::Storage(_)));
        assert!(err.to_string().contains("a/b"));
    }
}
