use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Orchestrator window and watchdog settings
/// - Scheduler policy parameters
/// - Engine invocation settings
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.orchestrator.base_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "orchestrator.base_dir cannot be empty".to_string(),
        ));
    }
    if config.orchestrator.max_batch == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_batch cannot be 0".to_string(),
        ));
    }

    if !(config.scheduler.load_fraction > 0.0 && config.scheduler.load_fraction <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "scheduler.load_fraction must be in (0, 1], got {}",
            config.scheduler.load_fraction
        )));
    }
    if config.scheduler.fixed_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.fixed_concurrency cannot be 0".to_string(),
        ));
    }
    if config.scheduler.fixed_chunk == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.fixed_chunk cannot be 0".to_string(),
        ));
    }
    if config.scheduler.drain_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.drain_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.engine.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "engine.timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.engine.corrupt_marker.is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.corrupt_marker cannot be empty".to_string(),
        ));
    }
    if regex_lite::Regex::new(&config.engine.corrupt_marker).is_err() {
        return Err(ConfigError::ValidationError(format!(
            "engine.corrupt_marker is not a valid pattern: {}",
            config.engine.corrupt_marker
        )));
    }

    Ok(())
}
