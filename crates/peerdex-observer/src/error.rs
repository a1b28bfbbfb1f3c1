//! Errors raised while probing the host.

use peerdex_core::ServiceError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of an OS-level resource probe.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// No mounted filesystem contains the path.
    #[error("No filesystem found for {0}")]
    NoFilesystem(PathBuf),

    /// The directory tree could not be walked.
    #[error("Cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProbeError> for ServiceError {
    fn from(err: ProbeError) -> Self {
        ServiceError::Probe(err.to_string())
    }
}

/// Result type for probe operations.
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
