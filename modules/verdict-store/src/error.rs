use uuid::Uuid;
use verdict_common::VerdictError;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Decision not found: {0}")]
    DecisionNotFound(Uuid),

    #[error("Stored row is invalid: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StoreError> for VerdictError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DecisionNotFound(id) => VerdictError::decision_not_found(id),
            other => VerdictError::Database(other.to_string()),
        }
    }
}

impl From<VerdictError> for StoreError {
    fn from(err: VerdictError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}
