use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, VerdictError>;

#[derive(Error, Debug)]
pub enum VerdictError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Decision {0} has no indicators")]
    NoIndicators(Uuid),

    #[error("Measurement for {indicator} is not a finite number: {value}")]
    InvalidMeasurement { indicator: String, value: f64 },

    #[error("Content hash already tracked: {0}")]
    DuplicateHash(String),

    #[error("{service} timed out after {}ms", after.as_millis())]
    ExternalServiceTimeout { service: &'static str, after: Duration },

    #[error("{service} failed: {message}")]
    ExternalServiceError { service: &'static str, message: String },

    #[error("Feed unavailable ({feed}): {reason}")]
    FeedUnavailable { feed: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl VerdictError {
    pub fn decision_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: "Decision",
            id: id.to_string(),
        }
    }

    pub fn indicator_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "Indicator",
            id: id.to_string(),
        }
    }

    /// Errors that must be degraded at the call site instead of propagated.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::ExternalServiceTimeout { .. } | Self::ExternalServiceError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_reports_millis() {
        let err = VerdictError::ExternalServiceTimeout {
            service: "classifier",
            after: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "classifier timed out after 5000ms");
        assert!(err.is_external());
    }

    #[test]
    fn not_found_names_kind() {
        let id = Uuid::nil();
        let err = VerdictError::decision_not_found(id);
        assert_eq!(err.to_string(), format!("Decision not found: {id}"));
        assert!(!err.is_external());
    }
}
