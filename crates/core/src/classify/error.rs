//! Error types for the classify module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while classifying a file.
///
/// A corrupt or empty file is not an error: it is reported through
/// [`Classification::corrupt_or_empty`](super::Classification) so the caller
/// can apply its quarantine policy.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The file does not exist.
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    /// I/O error while reading the header.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
