//! Trait definitions for the calibrate module.

use async_trait::async_trait;

use super::error::EngineError;
use super::types::{EngineRequest, EngineRun};

/// An engine that calibrates one raw exposure into summary artifacts.
#[async_trait]
pub trait CalibrationEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Runs one calibration, writing artifacts into the request's output
    /// directory. The input file is never modified.
    async fn run(&self, request: EngineRequest) -> Result<EngineRun, EngineError>;

    /// Validates that the engine is properly configured and ready.
    async fn validate(&self) -> Result<(), EngineError>;
}
