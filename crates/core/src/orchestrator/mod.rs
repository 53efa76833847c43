//! Pipeline orchestration.
//!
//! One invocation drives the whole tree through a fixed stage sequence:
//! orphan triage, compression sweep, candidate selection, windowed
//! calibration, re-compression, scratch cleanup and the disk-space
//! watchdog, bracketed by the permission hook. The orchestrator itself is
//! sequential; only the calibration and compression fan-out is parallel.

mod config;
mod runner;
mod types;
mod watchdog;

pub use config::OrchestratorConfig;
pub use runner::PipelineRunner;
pub use types::{OrchestratorError, PipelineReport, WatchdogReport};
pub use watchdog::free_space_gb;
