//! Error types for the compress module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during a storage-form transition.
#[derive(Debug, Error)]
pub enum CompressError {
    /// Source file not found.
    #[error("source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// The path does not carry the suffix the transition expects.
    #[error("{path} is not in the expected storage form")]
    WrongForm { path: PathBuf },

    /// The counterpart did not materialize on disk; the original was kept.
    #[error("counterpart for {path} was not written; original preserved")]
    VerificationFailed { path: PathBuf },

    /// I/O error while transcoding.
    #[error("I/O error transcoding {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking transcode task was cancelled or panicked.
    #[error("transcode task failed: {0}")]
    TaskFailed(String),
}
