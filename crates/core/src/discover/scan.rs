//! Tree scans over the fixed two-level data layout.
//!
//! All scans walk `<base>/<subdir>/<file>` exactly; deeper nesting is not
//! part of the layout contract and is ignored, except for scratch workspace
//! directories which are themselves at the file level.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::types::{DataFile, StorageForm, SCRATCH_PREFIX, UNKNOWN_BUCKET};

fn data_files(base: &Path) -> impl Iterator<Item = DataFile> {
    WalkDir::new(base)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .contains(".fits")
        })
        .map(|entry| DataFile::new(entry.into_path()))
}

/// All uncompressed data files anywhere under the base directory.
pub fn uncompressed_files(base: &Path) -> Vec<PathBuf> {
    data_files(base)
        .filter(|f| f.storage_form() == StorageForm::Uncompressed)
        .map(|f| f.path().to_path_buf())
        .collect()
}

/// Compressed raw inputs eligible for calibration.
pub fn compressed_raw_inputs(base: &Path) -> Vec<PathBuf> {
    data_files(base)
        .filter(|f| f.storage_form() == StorageForm::Compressed && f.is_raw_input())
        .map(|f| f.path().to_path_buf())
        .collect()
}

/// Uncompressed calibration-summary artifacts, for the disk-space watchdog.
pub fn uncompressed_summaries(base: &Path) -> Vec<PathBuf> {
    data_files(base)
        .filter(|f| f.storage_form() == StorageForm::Uncompressed && f.is_summary())
        .map(|f| f.path().to_path_buf())
        .collect()
}

/// Files sitting in the unknown-program bucket.
pub fn unknown_bucket_files(base: &Path) -> Vec<PathBuf> {
    let bucket = base.join(UNKNOWN_BUCKET);
    WalkDir::new(bucket)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().contains(".fits"))
        .map(|entry| entry.into_path())
        .collect()
}

/// Leftover scratch workspace directories from this or an earlier run.
pub fn scratch_dirs(base: &Path) -> Vec<PathBuf> {
    WalkDir::new(base)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(SCRATCH_PREFIX)
        })
        .map(|entry| entry.into_path())
        .collect()
}
