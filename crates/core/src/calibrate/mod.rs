//! Calibration of raw exposures through an external engine.
//!
//! The engine is an opaque executable invoked non-destructively per input
//! file, configured to emit only lightweight calibration-summary artifacts
//! into a private scratch workspace. The invoker owns the workspace
//! lifecycle: artifacts are relocated next to the input on success and the
//! workspace is removed on every exit path.

mod config;
mod error;
mod external;
mod invoker;
mod traits;
mod types;

pub(crate) use invoker::move_file;

pub use config::EngineConfig;
pub use error::EngineError;
pub use external::ExternalEngine;
pub use invoker::CalibrationInvoker;
pub use traits::CalibrationEngine;
pub use types::{CalibrationOutcome, EngineRequest, EngineRun};
