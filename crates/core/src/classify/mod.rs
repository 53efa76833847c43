//! File classification.
//!
//! Decides, from a single header keyword, whether a file needs calibration,
//! never will, or cannot be judged yet; flags files whose header cannot be
//! decoded at all so the caller can quarantine them. Also triages files in
//! the unknown-program bucket into relocate/delete actions.

mod classifier;
mod error;
mod fits;
mod types;

pub use classifier::FileClassifier;
pub use error::ClassifyError;
pub use fits::{read_primary_header, FitsHeader};
pub use types::{Classification, FileClass, OrphanAction};
