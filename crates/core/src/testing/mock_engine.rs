//! Mock calibration engine for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::calibrate::{CalibrationEngine, EngineError, EngineRequest, EngineRun};
use crate::discover::root_id;

/// A recorded engine invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    /// The request that was submitted.
    pub request: EngineRequest,
    /// Whether the run succeeded.
    pub success: bool,
}

/// Scripted failure for the next run.
#[derive(Debug, Clone)]
enum ScriptedFailure {
    CorruptInput,
    Failed(String),
}

/// Mock implementation of the CalibrationEngine trait.
///
/// Provides controllable behavior for testing:
/// - Track engine invocations for assertions
/// - Script the corrupt-input signal or a transient failure
/// - Control how many summary artifacts a successful run emits
#[derive(Debug, Clone)]
pub struct MockEngine {
    /// Recorded invocations.
    runs: Arc<RwLock<Vec<RecordedRun>>>,
    /// If set, the next run fails this way.
    next_failure: Arc<RwLock<Option<ScriptedFailure>>>,
    /// Summary artifacts written per successful run.
    artifacts_per_run: Arc<RwLock<usize>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine emitting one artifact per run.
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(Vec::new())),
            next_failure: Arc::new(RwLock::new(None)),
            artifacts_per_run: Arc::new(RwLock::new(1)),
        }
    }

    /// Get all recorded runs.
    pub async fn recorded_runs(&self) -> Vec<RecordedRun> {
        self.runs.read().await.clone()
    }

    /// Get the number of runs performed.
    pub async fn run_count(&self) -> usize {
        self.runs.read().await.len()
    }

    /// Make the next run signal empty-or-corrupt input.
    pub async fn fail_next_with_corrupt_input(&self) {
        *self.next_failure.write().await = Some(ScriptedFailure::CorruptInput);
    }

    /// Make the next run fail with an arbitrary engine error.
    pub async fn fail_next_with(&self, reason: &str) {
        *self.next_failure.write().await = Some(ScriptedFailure::Failed(reason.to_string()));
    }

    /// Set how many summary artifacts a successful run writes.
    pub async fn set_artifacts_per_run(&self, count: usize) {
        *self.artifacts_per_run.write().await = count;
    }
}

#[async_trait]
impl CalibrationEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, request: EngineRequest) -> Result<EngineRun, EngineError> {
        let failure = self.next_failure.write().await.take();
        if let Some(failure) = failure {
            self.runs.write().await.push(RecordedRun {
                request: request.clone(),
                success: false,
            });
            return Err(match failure {
                ScriptedFailure::CorruptInput => EngineError::CorruptInput {
                    path: request.input_path,
                },
                ScriptedFailure::Failed(reason) => EngineError::failed(reason, None),
            });
        }

        tokio::fs::create_dir_all(&request.output_dir).await?;
        let root = root_id(&request.input_path).unwrap_or_else(|| "unknown00".to_string());
        let artifacts = *self.artifacts_per_run.read().await;
        for idx in 0..artifacts {
            let letter = (b'a' + (idx % 26) as u8) as char;
            let name = format!("{root}_csum_{letter}.fits");
            tokio::fs::write(request.output_dir.join(name), b"mock summary artifact").await?;
        }

        self.runs.write().await.push(RecordedRun {
            request,
            success: true,
        });
        Ok(EngineRun { duration_ms: 1 })
    }

    async fn validate(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
