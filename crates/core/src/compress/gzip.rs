//! Gzip-backed storage-form transitions.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};

use crate::discover::GZ_SUFFIX;

use super::error::CompressError;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Outcome counts of a batch compression sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub transitioned: usize,
    pub failed: usize,
}

/// Reversible transcoder between compressed and uncompressed storage form.
#[derive(Debug, Clone)]
pub struct GzCompressor {
    level: Compression,
}

impl Default for GzCompressor {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl GzCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions one uncompressed file to compressed form.
    ///
    /// The compressed counterpart is written fully and verified on disk
    /// before the original is deleted. Returns the counterpart path.
    pub async fn to_gz_form(&self, path: &Path) -> Result<PathBuf, CompressError> {
        let source = path.to_path_buf();
        if source.to_string_lossy().ends_with(GZ_SUFFIX) {
            return Err(CompressError::WrongForm { path: source });
        }
        let target = PathBuf::from(format!("{}{}", source.display(), GZ_SUFFIX));

        let level = self.level;
        let (source, target) = run_blocking(move || {
            let input = open_source(&source)?;
            let out = File::create(&target).map_err(|e| io_err(&target, e))?;
            let mut encoder = GzEncoder::new(BufWriter::new(out), level);
            copy_stream(&mut BufReader::new(input), &mut encoder, &source)?;
            encoder
                .finish()
                .map_err(|e| io_err(&target, e))?
                .flush()
                .map_err(|e| io_err(&target, e))?;
            Ok((source, target))
        })
        .await?;

        self.finish_transition(&source, &target)?;
        Ok(target)
    }

    /// Transitions one compressed file back to uncompressed form.
    pub async fn from_gz_form(&self, path: &Path) -> Result<PathBuf, CompressError> {
        let source = path.to_path_buf();
        let target = match source.to_string_lossy().strip_suffix(GZ_SUFFIX) {
            Some(stem) => PathBuf::from(stem),
            None => return Err(CompressError::WrongForm { path: source }),
        };

        let (source, target) = run_blocking(move || {
            let input = open_source(&source)?;
            let out = File::create(&target).map_err(|e| io_err(&target, e))?;
            let mut writer = BufWriter::new(out);
            copy_stream(&mut GzDecoder::new(BufReader::new(input)), &mut writer, &source)?;
            writer.flush().map_err(|e| io_err(&target, e))?;
            Ok((source, target))
        })
        .await?;

        self.finish_transition(&source, &target)?;
        Ok(target)
    }

    /// Compresses every path, logging and counting failures instead of
    /// aborting the sweep.
    pub async fn compress_all(&self, paths: &[PathBuf]) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for path in paths {
            match self.to_gz_form(path).await {
                Ok(target) => {
                    info!("compressed {} -> {}", path.display(), target.display());
                    summary.transitioned += 1;
                }
                Err(e) => {
                    warn!("failed to compress {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Decompresses every path, logging and counting failures.
    pub async fn decompress_all(&self, paths: &[PathBuf]) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for path in paths {
            match self.from_gz_form(path).await {
                Ok(target) => {
                    info!("decompressed {} -> {}", path.display(), target.display());
                    summary.transitioned += 1;
                }
                Err(e) => {
                    warn!("failed to decompress {}: {}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Verifies the counterpart exists, then deletes the original.
    fn finish_transition(&self, source: &Path, target: &Path) -> Result<(), CompressError> {
        if !target.is_file() {
            return Err(CompressError::VerificationFailed {
                path: source.to_path_buf(),
            });
        }
        std::fs::remove_file(source).map_err(|e| io_err(source, e))
    }
}

fn open_source(path: &Path) -> Result<File, CompressError> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CompressError::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            io_err(path, e)
        }
    })
}

fn copy_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    path: &Path,
) -> Result<(), CompressError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buffer).map_err(|e| io_err(path, e))?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buffer[..n]).map_err(|e| io_err(path, e))?;
    }
}

fn io_err(path: &Path, e: std::io::Error) -> CompressError {
    CompressError::Io {
        path: path.to_path_buf(),
        source: e,
    }
}

async fn run_blocking<T: Send + 'static>(
    f: impl FnOnce() -> Result<T, CompressError> + Send + 'static,
) -> Result<T, CompressError> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CompressError::TaskFailed(e.to_string()))?
}
