//! Error type shared by all collaborator contracts.

use thiserror::Error;

/// Errors reported by external collaborators (parsers, stores, network).
///
/// None of these are fatal to the node: callers record, log or retry them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A document parser could not handle the content.
    #[error("Parser failure: {0}")]
    Parser(String),

    /// Loading a resource failed.
    #[error("Load failure: {0}")]
    Load(String),

    /// The content cache could not be read or cleared.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The full-text or reference index rejected an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A peer could not be reached or refused the request.
    #[error("Network error: {0}")]
    Network(String),

    /// The operation did not finish within its bound.
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// An OS probe could not be read.
    #[error("Probe error: {0}")]
    Probe(String),

    /// IO error, kept as text so the error stays cloneable.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err.to_string())
    }
}

/// Result type for collaborator operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
