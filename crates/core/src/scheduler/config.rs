//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the load-aware scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Fraction of free CPU capacity one scheduling round may claim.
    #[serde(default = "default_load_fraction")]
    pub load_fraction: f64,

    /// Seconds to wait between load re-samples while the system is
    /// saturated. This is deliberate backpressure: it prevents piling more
    /// engine runs onto a host that has no cycles for them.
    #[serde(default = "default_load_poll_interval")]
    pub load_poll_interval_secs: u64,

    /// Upper bound on the result drain. A worker that fails to report
    /// within this window fails the batch instead of hanging it.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,

    /// Worker count for the fixed-concurrency policy.
    #[serde(default = "default_fixed_concurrency")]
    pub fixed_concurrency: usize,

    /// Sub-batch size for the fixed-concurrency policy, bounding peak
    /// memory per round.
    #[serde(default = "default_fixed_chunk")]
    pub fixed_chunk: usize,
}

fn default_load_fraction() -> f64 {
    0.40
}

fn default_load_poll_interval() -> u64 {
    600
}

fn default_drain_timeout() -> u64 {
    3600
}

fn default_fixed_concurrency() -> usize {
    15
}

fn default_fixed_chunk() -> usize {
    25
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            load_fraction: default_load_fraction(),
            load_poll_interval_secs: default_load_poll_interval(),
            drain_timeout_secs: default_drain_timeout(),
            fixed_concurrency: default_fixed_concurrency(),
            fixed_chunk: default_fixed_chunk(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.load_fraction, 0.40);
        assert_eq!(config.load_poll_interval_secs, 600);
        assert_eq!(config.drain_timeout_secs, 3600);
        assert_eq!(config.fixed_concurrency, 15);
        assert_eq!(config.fixed_chunk, 25);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            load_fraction = 0.25
        "#;
        let config: SchedulerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.load_fraction, 0.25);
        assert_eq!(config.fixed_concurrency, 15);
    }
}
