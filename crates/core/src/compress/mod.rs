//! Storage-form transitions between compressed and uncompressed files.
//!
//! The transition rule is produce-then-delete: the counterpart form is
//! written fully and verified on disk before the original is removed, so a
//! failed transition never leaves both forms absent.

mod error;
mod gzip;

pub use error::CompressError;
pub use gzip::{GzCompressor, SweepSummary};
