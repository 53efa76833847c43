//! External calibration engine invocation.

use async_trait::async_trait;
use regex_lite::Regex;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::CalibrationEngine;
use super::types::{EngineRequest, EngineRun};

/// How many trailing stderr lines are kept for error reporting.
const STDERR_TAIL_LINES: usize = 40;

/// Wrapper around the external calibration executable.
pub struct ExternalEngine {
    config: EngineConfig,
}

impl ExternalEngine {
    /// Creates a new engine wrapper with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates an engine wrapper with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Builds the engine argument list for one request.
    ///
    /// The engine is always asked for summary artifacts only: full science
    /// products are suppressed and the output is left uncompressed so the
    /// pipeline's own compression pass owns the storage form.
    fn build_args(&self, request: &EngineRequest) -> Vec<String> {
        let mut args = vec![
            request.input_path.to_string_lossy().to_string(),
            "--outdir".to_string(),
            request.output_dir.to_string_lossy().to_string(),
            "--verbosity".to_string(),
            self.config.verbosity.to_string(),
            "--only-summary".to_string(),
            "--no-products".to_string(),
            "--no-compress".to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl CalibrationEngine for ExternalEngine {
    fn name(&self) -> &str {
        "external"
    }

    async fn run(&self, request: EngineRequest) -> Result<EngineRun, EngineError> {
        let start = Instant::now();

        if !request.input_path.exists() {
            return Err(EngineError::InputNotFound {
                path: request.input_path.clone(),
            });
        }
        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|_| EngineError::OutputDirectoryFailed {
                path: request.output_dir.clone(),
            })?;

        let args = self.build_args(&request);
        let mut child = Command::new(&self.config.engine_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::EngineNotFound {
                        path: self.config.engine_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        let stderr = child.stderr.take().expect("stderr should be captured");
        let mut reader = BufReader::new(stderr).lines();
        let corrupt_regex = Regex::new(&self.config.corrupt_marker).ok();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut corrupt_seen = false;
            let mut tail: Vec<String> = Vec::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if let Some(ref re) = corrupt_regex {
                    if re.is_match(&line) {
                        corrupt_seen = true;
                    }
                }
                tail.push(line);
                if tail.len() > STDERR_TAIL_LINES {
                    tail.remove(0);
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, bool, Vec<String>), std::io::Error>((
                status,
                corrupt_seen,
                tail,
            ))
        })
        .await;

        match result {
            Ok(Ok((status, corrupt_seen, tail))) => {
                if corrupt_seen {
                    return Err(EngineError::CorruptInput {
                        path: request.input_path.clone(),
                    });
                }
                if !status.success() {
                    let stderr_text = if tail.is_empty() {
                        None
                    } else {
                        Some(tail.join("\n"))
                    };
                    return Err(EngineError::failed(
                        format!("engine exited with code: {:?}", status.code()),
                        stderr_text,
                    ));
                }
                Ok(EngineRun {
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(EngineError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                Err(EngineError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }

    async fn validate(&self) -> Result<(), EngineError> {
        if !self.config.engine_path.is_file() {
            // PATH-resolved bare names cannot be checked without running them.
            if self.config.engine_path.components().count() > 1 {
                return Err(EngineError::EngineNotFound {
                    path: self.config.engine_path.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_args_summary_only_contract() {
        let engine = ExternalEngine::with_defaults();
        let request = EngineRequest {
            input_path: PathBuf::from("/d/1/lbgu17qnq_rawtag_a.fits.gz"),
            output_dir: PathBuf::from("/d/1/tmp_out-x"),
        };
        let args = engine.build_args(&request);
        assert_eq!(args[0], "/d/1/lbgu17qnq_rawtag_a.fits.gz");
        assert!(args.contains(&"--only-summary".to_string()));
        assert!(args.contains(&"--no-products".to_string()));
        assert!(args.contains(&"--no-compress".to_string()));
        let outdir_idx = args.iter().position(|a| a == "--outdir").unwrap();
        assert_eq!(args[outdir_idx + 1], "/d/1/tmp_out-x");
    }

    #[tokio::test]
    async fn test_missing_engine_binary() {
        let config = EngineConfig {
            engine_path: PathBuf::from("/nonexistent/engine-binary"),
            ..Default::default()
        };
        let engine = ExternalEngine::new(config);
        let temp = tempfile::TempDir::new().unwrap();
        let input = temp.path().join("x.fits");
        std::fs::write(&input, b"data").unwrap();

        let err = engine
            .run(EngineRequest {
                input_path: input,
                output_dir: temp.path().join("out"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EngineNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let engine = ExternalEngine::with_defaults();
        let temp = tempfile::TempDir::new().unwrap();

        let err = engine
            .run(EngineRequest {
                input_path: temp.path().join("absent.fits"),
                output_dir: temp.path().join("out"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InputNotFound { .. }));
    }
}
