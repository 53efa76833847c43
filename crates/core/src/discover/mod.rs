//! File discovery and naming conventions.
//!
//! The data tree has a fixed two-level layout: a base directory containing
//! one subdirectory per numeric program id, plus a literal `unknown` bucket
//! for files whose program could not be determined at retrieval time.
//! Filenames carry a fixed-width root identifier prefix that ties all
//! segment files of one exposure together.

mod scan;
mod types;

pub use scan::{
    compressed_raw_inputs, scratch_dirs, uncompressed_files, uncompressed_summaries,
    unknown_bucket_files,
};
pub use types::{
    only_one_segment, root_id, DataFile, StorageForm, GZ_SUFFIX, ROOT_ID_LEN, SCRATCH_PREFIX,
    SUMMARY_MARKER, UNKNOWN_BUCKET,
};
