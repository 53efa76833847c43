//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one pipeline pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Base directory of the data tree.
    pub base_dir: PathBuf,

    /// Dispatch calibration and compression through the load-aware
    /// scheduler instead of running serially.
    #[serde(default)]
    pub parallel: bool,

    /// Calibration window size. Candidates are calibrated in windows of
    /// this many files so scratch workspaces cannot exhaust the disk.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Free-space threshold for the disk watchdog, in GB.
    #[serde(default = "default_min_free_gb")]
    pub min_free_gb: u64,
}

fn default_max_batch() -> usize {
    3000
}

fn default_min_free_gb() -> u64 {
    200
}

impl OrchestratorConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            parallel: false,
            max_batch: default_max_batch(),
            min_free_gb: default_min_free_gb(),
        }
    }
}
