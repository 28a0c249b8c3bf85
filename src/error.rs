//! Error types for StudySync

use thiserror::Error;

/// Result type alias for StudySync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for StudySync
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Validation error from anything displayable
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    /// Not-found error for an entity kind and identifier
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        SyncError::NotFound(kind, id.into())
    }

    /// HTTP status code this error maps to
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::Validation(_) => 400,
            SyncError::Auth(_) | SyncError::Unauthorized(_) => 401,
            SyncError::NotFound(_, _) => 404,
            _ => 500,
        }
    }

    /// Whether the client may safely retry the request
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Database(_) | SyncError::Storage(_) | SyncError::Internal(_)
        )
    }
}
