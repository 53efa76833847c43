//! Test doubles and fixtures.
//!
//! Provides a controllable mock calibration engine and minimal FITS file
//! builders for exercising the pipeline without the real engine or real
//! instrument data.

pub mod fits;
mod mock_engine;
mod probe;

pub use mock_engine::{MockEngine, RecordedRun};
pub use probe::StaticLoadProbe;
