//! Error types of the staged pipeline.

use thiserror::Error;

/// Errors surfaced by stage queues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The stage stopped accepting items.
    #[error("Stage '{0}' is closed")]
    Closed(String),

    /// A worker task died instead of returning.
    #[error("Worker of stage '{stage}' panicked: {message}")]
    Panicked { stage: String, message: String },
}

/// Result type for stage operations.
pub type Result<T> = std::result::Result<T, StageError>;
