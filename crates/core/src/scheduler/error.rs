//! Error types for the scheduler module.

use thiserror::Error;

/// Errors that can occur during a scheduling round.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Caller configuration is invalid; nothing was spawned.
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    /// One or more workers failed to report before the drain deadline.
    #[error("scheduler barrier timed out; slices without results: {missing:?}")]
    BarrierTimeout { missing: Vec<usize> },

    /// One or more workers exited without reporting a result.
    #[error("worker(s) exited without reporting; slices without results: {missing:?}")]
    WorkerLost { missing: Vec<usize> },

    /// The scheduling round was cancelled while waiting for capacity.
    #[error("scheduling cancelled")]
    Cancelled,
}
