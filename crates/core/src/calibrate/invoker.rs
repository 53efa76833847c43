//! Calibration invocation with scratch workspace ownership.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classify::FileClassifier;
use crate::discover::{SCRATCH_PREFIX, SUMMARY_MARKER};

use super::traits::CalibrationEngine;
use super::types::{CalibrationOutcome, EngineRequest};

/// Drives one file through classification, engine invocation, artifact
/// relocation and workspace cleanup.
///
/// The scratch workspace is created beside the input, owned exclusively by
/// this invocation, and removed on every exit path so orphaned directories
/// cannot accumulate under concurrent failures.
pub struct CalibrationInvoker<E: CalibrationEngine> {
    engine: Arc<E>,
    classifier: FileClassifier,
}

impl<E: CalibrationEngine> Clone for CalibrationInvoker<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            classifier: self.classifier.clone(),
        }
    }
}

impl<E: CalibrationEngine> CalibrationInvoker<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            classifier: FileClassifier::new(),
        }
    }

    /// Calibrates one input file.
    ///
    /// Corruption, detected either by the pre-check or by the engine, is
    /// handled by deleting the input; any other engine failure leaves the
    /// input untouched for a future pass.
    pub async fn calibrate(&self, path: &Path) -> CalibrationOutcome {
        match self.classifier.classify(path) {
            Ok(c) if c.corrupt_or_empty => {
                return self.quarantine(path, "empty or corrupt input file").await;
            }
            Ok(c) if !c.needs_calibration() => {
                debug!("skipping {}: {:?}", path.display(), c.class);
                return CalibrationOutcome::Skipped;
            }
            Ok(_) => {}
            Err(e) => {
                return CalibrationOutcome::EngineError {
                    detail: e.to_string(),
                }
            }
        }

        let Some(parent) = path.parent() else {
            return CalibrationOutcome::EngineError {
                detail: format!("{} has no parent directory", path.display()),
            };
        };
        let scratch = parent.join(format!("{}-{}", SCRATCH_PREFIX, Uuid::new_v4()));

        let outcome = self.run_in_scratch(path, parent, &scratch).await;

        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove scratch {}: {}", scratch.display(), e);
            }
        }

        outcome
    }

    async fn run_in_scratch(&self, path: &Path, dest: &Path, scratch: &Path) -> CalibrationOutcome {
        let request = EngineRequest {
            input_path: path.to_path_buf(),
            output_dir: scratch.to_path_buf(),
        };

        match self.engine.run(request).await {
            Ok(run) => {
                match self.collect_artifacts(scratch, dest).await {
                    Ok(products) => {
                        info!(
                            "calibrated {} in {} ms, {} summary product(s)",
                            path.display(),
                            run.duration_ms,
                            products
                        );
                        CalibrationOutcome::Calibrated { products }
                    }
                    Err(e) => CalibrationOutcome::EngineError {
                        detail: format!("failed to relocate artifacts: {e}"),
                    },
                }
            }
            Err(e) if e.is_corrupt_input() => self.quarantine(path, &e.to_string()).await,
            Err(e) => {
                warn!("engine failed on {}: {}", path.display(), e);
                CalibrationOutcome::EngineError {
                    detail: e.to_string(),
                }
            }
        }
    }

    /// Moves every summary artifact out of the scratch workspace.
    async fn collect_artifacts(&self, scratch: &Path, dest: &Path) -> std::io::Result<usize> {
        let mut moved = 0;
        let mut entries = tokio::fs::read_dir(scratch).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.contains(SUMMARY_MARKER) {
                continue;
            }
            move_file(&entry.path(), &dest.join(&name)).await?;
            moved += 1;
        }
        Ok(moved)
    }

    /// Deletes the input and reports it quarantined. Corruption is always
    /// handled by deletion, never by retry.
    async fn quarantine(&self, path: &Path, reason: &str) -> CalibrationOutcome {
        warn!("quarantining {}: {}", path.display(), reason);
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("failed to delete quarantined {}: {}", path.display(), e);
        }
        CalibrationOutcome::Quarantined {
            reason: reason.to_string(),
        }
    }
}

/// Moves a file, falling back to copy-then-delete across filesystems.
pub(crate) async fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(e)
            if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) =>
        {
            tokio::fs::copy(source, destination).await?;
            tokio::fs::remove_file(source).await
        }
        Err(e) => Err(e),
    }
}
