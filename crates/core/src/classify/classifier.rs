//! Header-driven file classification.

use std::path::Path;

use tracing::debug;

use crate::discover::{root_id, SUMMARY_MARKER};

use super::error::ClassifyError;
use super::fits::read_primary_header;
use super::types::{Classification, FileClass, OrphanAction};

/// Header keyword carrying the exposure type.
const EXPTYPE_KEY: &str = "EXPTYPE";
/// Header keyword identifying the instrument; absent on non-member files.
const INSTRUMENT_KEY: &str = "INSTRUME";
/// Header keyword carrying the observing program id.
const PROGRAM_ID_KEY: &str = "PROPOSID";
/// Header keyword present only on reference files.
const REFERENCE_KEY: &str = "USEAFTER";

/// Exposure subtypes that never need calibration.
const NEVER_CALIBRATED: [&str; 2] = ["ACQ/PEAKD", "ACQ/PEAKXD"];

/// Classifies candidate files from a single header keyword and triages
/// unknown-program orphans.
#[derive(Debug, Default, Clone)]
pub struct FileClassifier;

impl FileClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classifies one candidate file.
    ///
    /// Reads only the primary header. A missing exposure-type keyword means
    /// the file is not yet calibratable, not that anything is wrong; an
    /// undecodable or empty file sets the corrupt flag so the caller can
    /// quarantine it.
    pub fn classify(&self, path: &Path) -> Result<Classification, ClassifyError> {
        let header = match read_primary_header(path).map_err(|e| map_io(path, e))? {
            Some(header) => header,
            None => {
                return Ok(Classification {
                    class: FileClass::NotYetCalibratable,
                    corrupt_or_empty: true,
                })
            }
        };

        let exptype = match header.value(EXPTYPE_KEY) {
            Some(value) => value.to_string(),
            None => {
                return Ok(Classification {
                    class: FileClass::NotYetCalibratable,
                    corrupt_or_empty: false,
                })
            }
        };

        if NEVER_CALIBRATED.contains(&exptype.as_str()) {
            return Ok(Classification {
                class: FileClass::AcquisitionPeak,
                corrupt_or_empty: false,
            });
        }

        // Existing summary products do not suppress recalibration; every
        // eligible exposure is recomputed on every pass.
        let existing = self.existing_summaries(path);
        if existing > 0 {
            debug!(
                "{} already has {} summary product(s); recalibrating anyway",
                path.display(),
                existing
            );
        }

        Ok(Classification {
            class: FileClass::NeedsCalibration,
            corrupt_or_empty: false,
        })
    }

    /// Triages a file from the unknown-program bucket.
    ///
    /// Order matters: a missing instrument tag is fatal; a positive program
    /// id relocates; otherwise the reference-file marker selects between the
    /// two deletion reasons. A file whose header cannot be decoded carries
    /// no instrument tag and is triaged as a non-member.
    pub fn resolve_orphan(&self, path: &Path) -> Result<OrphanAction, ClassifyError> {
        let header = match read_primary_header(path).map_err(|e| map_io(path, e))? {
            Some(header) => header,
            None => return Ok(OrphanAction::DeleteNonMember),
        };

        if header.value(INSTRUMENT_KEY).is_none() {
            return Ok(OrphanAction::DeleteNonMember);
        }

        if let Some(pid) = header.int_value(PROGRAM_ID_KEY) {
            if pid > 0 {
                return Ok(OrphanAction::Relocate {
                    program_id: pid as u32,
                });
            }
            return Ok(OrphanAction::LeaveInPlace);
        }

        if header.value(REFERENCE_KEY).is_some() {
            return Ok(OrphanAction::DeleteReferenceFile);
        }
        Ok(OrphanAction::DeleteNonMember)
    }

    /// Counts summary products already present for this file's root.
    fn existing_summaries(&self, path: &Path) -> usize {
        let (Some(root), Some(dir)) = (root_id(path), path.parent()) else {
            return 0;
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.starts_with(&root) && name.contains(SUMMARY_MARKER)
            })
            .count()
    }
}

fn map_io(path: &Path, e: std::io::Error) -> ClassifyError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ClassifyError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        ClassifyError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}
