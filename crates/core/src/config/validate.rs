use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Backend URL is an http(s) URL
/// - Poll intervals are non-zero and busy polling is not slower than idle polling
/// - Reconnect delay and debounce window are non-zero
/// - Status port is set when the status endpoint is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let url = config.backend.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "backend.base_url must start with http:// or https://, got '{}'",
            url
        )));
    }

    let polling = &config.polling;
    if polling.busy_interval_ms == 0 || polling.idle_interval_ms == 0 || polling.log_interval_ms == 0
    {
        return Err(ConfigError::ValidationError(
            "polling intervals cannot be 0".to_string(),
        ));
    }
    if polling.busy_interval_ms > polling.idle_interval_ms {
        return Err(ConfigError::ValidationError(
            "polling.busy_interval_ms cannot exceed polling.idle_interval_ms".to_string(),
        ));
    }

    if config.push.reconnect_delay_ms == 0 {
        return Err(ConfigError::ValidationError(
            "push.reconnect_delay_ms cannot be 0".to_string(),
        ));
    }
    if !config.push.path.starts_with('/') {
        return Err(ConfigError::ValidationError(
            "push.path must start with '/'".to_string(),
        ));
    }

    if config.sync.debounce_ms == 0 {
        return Err(ConfigError::ValidationError(
            "sync.debounce_ms cannot be 0".to_string(),
        ));
    }

    if config.status.enabled && config.status.port == 0 {
        return Err(ConfigError::ValidationError(
            "status.port cannot be 0 when the status endpoint is enabled".to_string(),
        ));
    }

    Ok(())
}
