//! Calibration engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the external calibration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the engine executable.
    #[serde(default = "default_engine_path")]
    pub engine_path: PathBuf,

    /// Verbosity level passed to the engine.
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    /// Maximum wall-clock seconds for one engine invocation.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Regular expression matched against stderr lines by which the engine
    /// signals empty or corrupt input. The quarantine policy depends on
    /// this signal being distinguishable from every other failure.
    #[serde(default = "default_corrupt_marker")]
    pub corrupt_marker: String,

    /// Extra arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("calibrate-engine")
}

fn default_verbosity() -> u8 {
    2
}

fn default_timeout() -> u64 {
    3600
}

fn default_corrupt_marker() -> String {
    "Empty or corrupt input".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            verbosity: default_verbosity(),
            timeout_secs: default_timeout(),
            corrupt_marker: default_corrupt_marker(),
            extra_args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.verbosity, 2);
        assert_eq!(config.timeout_secs, 3600);
        assert_eq!(config.corrupt_marker, "Empty or corrupt input");
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            engine_path = "/opt/engine/bin/calibrate"
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.engine_path, PathBuf::from("/opt/engine/bin/calibrate"));
        assert_eq!(config.verbosity, 2);
    }
}
