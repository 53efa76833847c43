//! Error types for the calibrate module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while invoking the calibration engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary not found.
    #[error("calibration engine not found at path: {path}")]
    EngineNotFound { path: PathBuf },

    /// Input file not found.
    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Scratch output directory could not be created.
    #[error("failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// The engine signalled that the input is empty or corrupt.
    ///
    /// This condition is handled by quarantine, never by retry, and must
    /// stay distinguishable from every other failure.
    #[error("engine reports empty or corrupt input: {path}")]
    CorruptInput { path: PathBuf },

    /// The engine failed for any other reason; the input is left for a
    /// future pass.
    #[error("engine run failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    /// The engine run exceeded its timeout and was killed.
    #[error("engine run timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while driving the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a failed-run error with captured stderr output.
    pub fn failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Whether this error quarantines the input instead of leaving it.
    pub fn is_corrupt_input(&self) -> bool {
        matches!(self, Self::CorruptInput { .. })
    }
}
