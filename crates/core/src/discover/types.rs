//! Naming model for files in the data tree.

use std::path::{Path, PathBuf};

/// Length of the root identifier prefix shared by all segment files of one
/// logical exposure.
pub const ROOT_ID_LEN: usize = 9;

/// Suffix appended to a file name in compressed storage form.
pub const GZ_SUFFIX: &str = ".gz";

/// Marker substring identifying calibration-summary artifacts.
pub const SUMMARY_MARKER: &str = "csum";

/// Prefix of per-invocation scratch workspace directories.
pub const SCRATCH_PREFIX: &str = "tmp_out";

/// Bucket directory for files whose program id is unknown.
pub const UNKNOWN_BUCKET: &str = "unknown";

/// Storage form of a data file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageForm {
    Compressed,
    Uncompressed,
}

/// A file in the data tree, identified by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    path: PathBuf,
}

impl DataFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The root identifier prefix of the file name, if the name is long
    /// enough to carry one.
    pub fn root_id(&self) -> Option<String> {
        root_id(&self.path)
    }

    pub fn storage_form(&self) -> StorageForm {
        if self.file_name().ends_with(GZ_SUFFIX) {
            StorageForm::Compressed
        } else {
            StorageForm::Uncompressed
        }
    }

    /// Whether this file is a raw input the calibration engine accepts.
    ///
    /// Raw science exposures come in `rawtag` segment files; acquisitions
    /// come as a single `rawacq` file.
    pub fn is_raw_input(&self) -> bool {
        let name = self.file_name();
        let stem = name.strip_suffix(GZ_SUFFIX).unwrap_or(&name);
        (stem.contains("rawtag") || stem.contains("rawacq")) && stem.ends_with(".fits")
    }

    /// Whether this file is a calibration-summary artifact.
    pub fn is_summary(&self) -> bool {
        self.file_name().contains(SUMMARY_MARKER)
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Extracts the root identifier from a path's file name.
pub fn root_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    if name.chars().count() < ROOT_ID_LEN {
        return None;
    }
    Some(name.chars().take(ROOT_ID_LEN).collect())
}

/// Keeps only the first file encountered per root identifier, preserving
/// encounter order.
///
/// Dual-segment exposures produce `rawtag_a` and `rawtag_b` files that the
/// engine calibrates jointly; handing it both segments would duplicate work.
/// Files too short to carry a root identifier are kept as-is.
pub fn only_one_segment(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen: Vec<String> = Vec::new();
    let mut kept = Vec::new();
    for file in files {
        match root_id(&file) {
            Some(root) => {
                if !seen.contains(&root) {
                    seen.push(root);
                    kept.push(file);
                }
            }
            None => kept.push(file),
        }
    }
    kept
}
