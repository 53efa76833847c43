//! Types for the orchestrator module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline pass before any work begins.
///
/// Per-file problems never surface here; they are counted in the report and
/// the pass continues.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The configured base directory does not exist.
    #[error("base directory not found: {path}")]
    BaseDirMissing { path: PathBuf },
}

/// Summary of one pipeline pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Orphan triage results.
    pub orphans_relocated: usize,
    pub orphans_deleted: usize,
    pub orphans_left: usize,

    /// First compression sweep.
    pub compressed: usize,
    pub compression_failures: usize,

    /// Calibration stage.
    pub candidates: usize,
    pub calibrated: usize,
    pub skipped: usize,
    pub quarantined: usize,
    pub engine_errors: usize,
    /// Scheduler-level failures, one entry per failed window.
    pub window_failures: Vec<String>,

    /// Second compression sweep.
    pub recompressed: usize,

    /// Scratch workspaces removed during cleanup.
    pub scratch_removed: usize,

    pub watchdog: WatchdogReport,
}

impl PipelineReport {
    /// One-line summary for the end-of-run log.
    pub fn summary(&self) -> String {
        format!(
            "candidates {}, calibrated {}, skipped {}, quarantined {}, engine errors {}, \
             compressed {}+{}, orphans {}/{}/{}, scratch removed {}",
            self.candidates,
            self.calibrated,
            self.skipped,
            self.quarantined,
            self.engine_errors,
            self.compressed,
            self.recompressed,
            self.orphans_relocated,
            self.orphans_deleted,
            self.orphans_left,
            self.scratch_removed,
        )
    }
}

/// Disk watchdog results.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchdogReport {
    /// Free space on the base directory's filesystem, when readable.
    pub free_gb: Option<f64>,
    /// Whether the free space was below the configured threshold.
    pub below_threshold: bool,
    /// Summary artifacts compressed by the emergency sweep.
    pub swept: usize,
    /// The threshold was crossed but nothing was left to compress.
    pub nothing_to_compress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_mentions_counts() {
        let report = PipelineReport {
            candidates: 7,
            calibrated: 5,
            quarantined: 2,
            ..Default::default()
        };
        let summary = report.summary();
        assert!(summary.contains("candidates 7"));
        assert!(summary.contains("calibrated 5"));
        assert!(summary.contains("quarantined 2"));
    }
}
