//! Error types for the trade decision router

use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Hard failures. Policy rejections are not errors; they travel as
/// [`crate::policy::PolicyVerdict`] values.
#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Decision Pipeline Errors
    // =============================

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Submission failure: {0}")]
    SubmissionFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // Collaborator Errors
    // =============================

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Ingestion error: {0}")]
    IngestionError(String),

    #[error("Narrative error: {0}")]
    NarrativeError(String),

    #[error("Audit error: {0}")]
    AuditError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Stable code recorded as the decision reason when this error ends a call.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestrationError::InvalidInput(_) => "invalid-input",
            OrchestrationError::ProviderUnavailable(_) => "provider-unavailable",
            OrchestrationError::SubmissionFailure(_) => "submission-failed",
            OrchestrationError::Config(_) => "config-error",
            OrchestrationError::DatabaseError(_) => "storage-error",
            OrchestrationError::IngestionError(_) => "ingestion-failed",
            OrchestrationError::NarrativeError(_) => "narrative-failed",
            OrchestrationError::AuditError(_) => "audit-error",
            OrchestrationError::SerializationError(_) => "serialization-error",
            OrchestrationError::HttpError(_) => "http-error",
            OrchestrationError::IoError(_) => "io-error",
        }
    }
}

impl From<sqlx::Error> for OrchestrationError {
    fn from(e: sqlx::Error) -> Self {
        OrchestrationError::DatabaseError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            OrchestrationError::ProviderUnavailable("x".into()).code(),
            "provider-unavailable"
        );
        assert_eq!(
            OrchestrationError::SubmissionFailure("rpc down".into()).code(),
            "submission-failed"
        );
        let msg = OrchestrationError::InvalidInput("size".into()).to_string();
        assert_eq!(msg, "Invalid input: size");
    }
}
