//! Pipeline runner implementation.
//!
//! Stage order is strict: space is reclaimed before calibration begins,
//! calibration leftovers are compressed afterwards, and scratch cleanup
//! plus the disk watchdog close the pass. Per-file failures are counted
//! and never abort the run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::calibrate::{move_file, CalibrationEngine, CalibrationInvoker, CalibrationOutcome};
use crate::classify::{FileClassifier, OrphanAction};
use crate::compress::GzCompressor;
use crate::discover::{
    compressed_raw_inputs, only_one_segment, scratch_dirs, uncompressed_files,
    uncompressed_summaries, unknown_bucket_files,
};
use crate::permissions::PermissionBracket;
use crate::scheduler::LoadAwareScheduler;

use super::config::OrchestratorConfig;
use super::types::{OrchestratorError, PipelineReport};
use super::watchdog::free_space_gb;

/// Drives one pass of the pipeline over the data tree.
pub struct PipelineRunner<E: CalibrationEngine + 'static> {
    config: OrchestratorConfig,
    classifier: FileClassifier,
    compressor: GzCompressor,
    invoker: CalibrationInvoker<E>,
    scheduler: LoadAwareScheduler,
    permissions: Arc<dyn PermissionBracket>,
    cancel: CancellationToken,
}

impl<E: CalibrationEngine + 'static> PipelineRunner<E> {
    /// Creates a runner over the given engine, scheduler and permission
    /// bracket.
    pub fn new(
        config: OrchestratorConfig,
        engine: Arc<E>,
        scheduler: LoadAwareScheduler,
        permissions: Arc<dyn PermissionBracket>,
    ) -> Self {
        Self {
            config,
            classifier: FileClassifier::new(),
            compressor: GzCompressor::new(),
            invoker: CalibrationInvoker::new(engine),
            scheduler,
            permissions,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token, checked between windows and stages.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs one full pipeline pass.
    pub async fn run(&self) -> Result<PipelineReport, OrchestratorError> {
        let base = &self.config.base_dir;
        if !base.is_dir() {
            return Err(OrchestratorError::BaseDirMissing { path: base.clone() });
        }

        let mut report = PipelineReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };
        info!("beginning pipeline pass in {}", base.display());

        self.permissions.open(base).await;

        self.resolve_orphans(&mut report).await;
        self.compression_sweep(&mut report, false).await;
        let candidates = self.select_candidates(&mut report);
        self.calibrate_windows(candidates, &mut report).await;
        self.compression_sweep(&mut report, true).await;
        self.cleanup_scratch(&mut report).await;
        self.run_watchdog(&mut report).await;

        self.permissions.close(base).await;

        report.finished_at = Some(Utc::now());
        info!("pipeline pass finished: {}", report.summary());
        Ok(report)
    }

    /// Stage 1: triage files in the unknown-program bucket.
    async fn resolve_orphans(&self, report: &mut PipelineReport) {
        let start = Instant::now();
        let orphans = unknown_bucket_files(&self.config.base_dir);
        if orphans.is_empty() {
            return;
        }
        info!("resolving {} orphan file(s)", orphans.len());

        for path in orphans {
            match self.classifier.resolve_orphan(&path) {
                Ok(OrphanAction::Relocate { program_id }) => {
                    let target_dir = self.config.base_dir.join(program_id.to_string());
                    let Some(name) = path.file_name() else {
                        continue;
                    };
                    let result = async {
                        tokio::fs::create_dir_all(&target_dir).await?;
                        move_file(&path, &target_dir.join(name)).await
                    }
                    .await;
                    match result {
                        Ok(()) => {
                            info!("relocated {} to program {}", path.display(), program_id);
                            report.orphans_relocated += 1;
                        }
                        Err(e) => warn!("failed to relocate {}: {}", path.display(), e),
                    }
                }
                Ok(OrphanAction::DeleteReferenceFile) | Ok(OrphanAction::DeleteNonMember) => {
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => {
                            info!("deleted orphan {}", path.display());
                            report.orphans_deleted += 1;
                        }
                        Err(e) => warn!("failed to delete orphan {}: {}", path.display(), e),
                    }
                }
                Ok(OrphanAction::LeaveInPlace) => {
                    debug!("leaving orphan {} in place", path.display());
                    report.orphans_left += 1;
                }
                Err(e) => warn!("failed to triage orphan {}: {}", path.display(), e),
            }
        }
        info!("orphan triage finished in {:?}", start.elapsed());
    }

    /// Stages 2 and 5: compress every uncompressed file under the tree.
    async fn compression_sweep(&self, report: &mut PipelineReport, recompress: bool) {
        let start = Instant::now();
        let paths = uncompressed_files(&self.config.base_dir);
        if paths.is_empty() {
            return;
        }
        info!("compressing {} uncompressed file(s)", paths.len());

        let (transitioned, failed) = self.compress_paths(paths).await;
        if recompress {
            report.recompressed += transitioned;
        } else {
            report.compressed += transitioned;
        }
        report.compression_failures += failed;
        info!("compression sweep finished in {:?}", start.elapsed());
    }

    /// Stage 3: pick the calibration candidates.
    ///
    /// Corrupt files are deleted on the spot; dual-segment exposures are
    /// reduced to one representative segment per root.
    fn select_candidates(&self, report: &mut PipelineReport) -> Vec<PathBuf> {
        let mut eligible = Vec::new();
        for path in compressed_raw_inputs(&self.config.base_dir) {
            match self.classifier.classify(&path) {
                Ok(c) if c.corrupt_or_empty => {
                    warn!("file is empty or corrupt, deleting: {}", path.display());
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!("failed to delete {}: {}", path.display(), e);
                    }
                    report.quarantined += 1;
                }
                Ok(c) if c.needs_calibration() => eligible.push(path),
                Ok(_) => {
                    debug!("not a calibration candidate: {}", path.display());
                    report.skipped += 1;
                }
                Err(e) => warn!("failed to classify {}: {}", path.display(), e),
            }
        }

        let candidates = only_one_segment(eligible);
        report.candidates = candidates.len();
        candidates
    }

    /// Stage 4: calibrate candidates in fixed-size windows.
    async fn calibrate_windows(&self, candidates: Vec<PathBuf>, report: &mut PipelineReport) {
        if candidates.is_empty() {
            return;
        }
        let total = candidates.len();
        info!(
            "calibrating {} candidate(s) in window(s) of {}",
            total, self.config.max_batch
        );

        for (window_idx, window) in candidates.chunks(self.config.max_batch).enumerate() {
            if self.cancel.is_cancelled() {
                warn!("cancellation requested; skipping remaining calibration windows");
                report
                    .window_failures
                    .push("cancelled before completion".to_string());
                break;
            }

            let start = Instant::now();
            let offset = window_idx * self.config.max_batch;
            info!(
                "calibrating files {}:{} of {}",
                offset,
                offset + window.len(),
                total
            );

            let outcomes = if self.config.parallel {
                let invoker = self.invoker.clone();
                let worker = move |slice: Vec<PathBuf>| {
                    let invoker = invoker.clone();
                    async move {
                        let mut results = HashMap::new();
                        for path in slice {
                            let outcome = invoker.calibrate(&path).await;
                            results.insert(path, outcome);
                        }
                        results
                    }
                };
                match self.scheduler.run(window.to_vec(), worker).await {
                    Ok(outcomes) => outcomes,
                    Err(e) => {
                        warn!("calibration window failed: {}", e);
                        report.window_failures.push(e.to_string());
                        continue;
                    }
                }
            } else {
                let mut outcomes = HashMap::new();
                for path in window {
                    let outcome = self.invoker.calibrate(path).await;
                    outcomes.insert(path.clone(), outcome);
                }
                outcomes
            };

            for outcome in outcomes.values() {
                match outcome {
                    CalibrationOutcome::Calibrated { .. } => report.calibrated += 1,
                    CalibrationOutcome::Skipped => report.skipped += 1,
                    CalibrationOutcome::Quarantined { .. } => report.quarantined += 1,
                    CalibrationOutcome::EngineError { .. } => report.engine_errors += 1,
                }
            }
            info!("window finished in {:?}", start.elapsed());
        }
    }

    /// Stage 6: remove leftover scratch workspaces, including any left by
    /// an interrupted earlier run.
    async fn cleanup_scratch(&self, report: &mut PipelineReport) {
        for dir in scratch_dirs(&self.config.base_dir) {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {
                    info!("removed leftover scratch workspace {}", dir.display());
                    report.scratch_removed += 1;
                }
                Err(e) => warn!("failed to remove scratch {}: {}", dir.display(), e),
            }
        }
    }

    /// Stage 7: reclaim space when the filesystem is close to full.
    async fn run_watchdog(&self, report: &mut PipelineReport) {
        let free = free_space_gb(&self.config.base_dir);
        report.watchdog.free_gb = free;

        let Some(free_gb) = free else {
            warn!(
                "could not determine free space for {}",
                self.config.base_dir.display()
            );
            return;
        };

        if free_gb >= self.config.min_free_gb as f64 {
            return;
        }
        report.watchdog.below_threshold = true;
        warn!("only {:.1} GB left on disk", free_gb);

        let summaries = uncompressed_summaries(&self.config.base_dir);
        if summaries.is_empty() {
            warn!("disk space is running very low and no summary artifacts are left to compress");
            report.watchdog.nothing_to_compress = true;
            return;
        }

        info!("compressing {} summary artifact(s) to save space", summaries.len());
        let (transitioned, failed) = self.compress_paths(summaries).await;
        report.watchdog.swept = transitioned;
        report.compression_failures += failed;
    }

    /// Compresses a path list through the scheduler or serially, returning
    /// (transitioned, failed) counts.
    async fn compress_paths(&self, paths: Vec<PathBuf>) -> (usize, usize) {
        if !self.config.parallel {
            let summary = self.compressor.compress_all(&paths).await;
            return (summary.transitioned, summary.failed);
        }

        let compressor = self.compressor.clone();
        let worker = move |slice: Vec<PathBuf>| {
            let compressor = compressor.clone();
            async move {
                let mut results = HashMap::new();
                for path in slice {
                    let ok = match compressor.to_gz_form(&path).await {
                        Ok(_) => true,
                        Err(e) => {
                            warn!("failed to compress {}: {}", path.display(), e);
                            false
                        }
                    };
                    results.insert(path, ok);
                }
                results
            }
        };

        match self.scheduler.run(paths.clone(), worker).await {
            Ok(results) => {
                let transitioned = results.values().filter(|ok| **ok).count();
                (transitioned, results.len() - transitioned)
            }
            Err(e) => {
                warn!("parallel compression failed ({}), retrying serially", e);
                // A failed round may have transitioned some paths already.
                let remaining: Vec<PathBuf> =
                    paths.into_iter().filter(|path| path.exists()).collect();
                let summary = self.compressor.compress_all(&remaining).await;
                (summary.transitioned, summary.failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::NoopPermissionBracket;
    use crate::scheduler::SchedulerConfig;
    use crate::testing::fits::write_fits;
    use crate::testing::MockEngine;
    use tempfile::TempDir;

    fn runner(base: &std::path::Path, engine: MockEngine) -> PipelineRunner<MockEngine> {
        PipelineRunner::new(
            OrchestratorConfig::new(base),
            Arc::new(engine),
            LoadAwareScheduler::new(SchedulerConfig::default()),
            Arc::new(NoopPermissionBracket),
        )
    }

    #[tokio::test]
    async fn test_missing_base_dir_aborts() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("nope");
        let result = runner(&gone, MockEngine::new()).run().await;
        assert!(matches!(
            result,
            Err(OrchestratorError::BaseDirMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_orphan_relocation_creates_program_dir() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        let orphan = base.join("unknown/lbgu17qnq_rawtag_a.fits");
        std::fs::create_dir_all(base.join("unknown")).unwrap();
        write_fits(&orphan, &[("INSTRUME", "COS"), ("PROPOSID", "12345")]);

        let report = runner(base, MockEngine::new()).run().await.unwrap();

        assert_eq!(report.orphans_relocated, 1);
        assert!(!orphan.exists());
        // Relocated, then compressed by the sweep.
        assert!(base.join("12345/lbgu17qnq_rawtag_a.fits.gz").is_file());
    }

    #[tokio::test]
    async fn test_orphan_non_member_deleted() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        std::fs::create_dir_all(base.join("unknown")).unwrap();
        let stray = base.join("unknown/lref12345_stray.fits");
        write_fits(&stray, &[("USEAFTER", "Jan 01 2020")]);

        let report = runner(base, MockEngine::new()).run().await.unwrap();
        assert_eq!(report.orphans_deleted, 1);
        assert!(!stray.exists());
    }

    #[tokio::test]
    async fn test_corrupt_candidate_deleted_at_selection() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        std::fs::create_dir_all(base.join("12345")).unwrap();
        let corrupt = base.join("12345/lbgu17qnq_rawtag_a.fits.gz");
        std::fs::write(&corrupt, b"not gzip at all").unwrap();

        let report = runner(base, MockEngine::new()).run().await.unwrap();
        assert_eq!(report.quarantined, 1);
        assert!(!corrupt.exists());
    }

    #[tokio::test]
    async fn test_stale_scratch_dirs_removed() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        std::fs::create_dir_all(base.join("12345/tmp_out-stale")).unwrap();
        std::fs::write(base.join("12345/tmp_out-stale/partial_csum.fits"), b"x").unwrap();

        let report = runner(base, MockEngine::new()).run().await.unwrap();
        assert_eq!(report.scratch_removed, 1);
        assert!(!base.join("12345/tmp_out-stale").exists());
    }
}
