//! Error types for the loan orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Workflow Errors
    // =============================

    /// Malformed input (non-numeric amount, bad customer id).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A step was requested before the session was ready for it.
    #[error("Invalid precondition: {0}")]
    InvalidPrecondition(String),

    // =============================
    // Collaborator Errors
    // =============================

    /// Collaborator could not be reached; callers fall back locally.
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// Collaborator was reached but failed; fatal for document and notification calls.
    #[error("Collaborator failure: {0}")]
    CollaboratorFailure(String),

    #[error("Timed out after {seconds}s waiting for {collaborator}")]
    Timeout {
        collaborator: &'static str,
        seconds: u64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}
