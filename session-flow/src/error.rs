use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors produced by the session layer.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}
