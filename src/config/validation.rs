use crate::config::types::{Config, ExpiryConfig, HttpConfig, ProbeConfig, RetryConfig};
use crate::{ConfigError, ConfigResult};
use url::Url;

const MAX_REDIRECT_CAP: usize = 20;
const MAX_ATTEMPT_CAP: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_http_config(&config.http)?;
    validate_retry_config(&config.retry)?;
    validate_probe_config(&config.probe)?;
    validate_expiry_config(&config.expiry)?;
    Ok(())
}

/// Validates HTTP client configuration
fn validate_http_config(config: &HttpConfig) -> ConfigResult<()> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "http.timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "http.connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_redirects > MAX_REDIRECT_CAP {
        return Err(ConfigError::Validation(format!(
            "http.max-redirects must be <= {}, got {}",
            MAX_REDIRECT_CAP, config.max_redirects
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "http.user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_attempts(field: &str, attempts: u32) -> ConfigResult<()> {
    if attempts < 1 || attempts > MAX_ATTEMPT_CAP {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            field, MAX_ATTEMPT_CAP, attempts
        )));
    }
    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> ConfigResult<()> {
    validate_attempts("retry.max-attempts", config.max_attempts)
}

fn validate_probe_config(config: &ProbeConfig) -> ConfigResult<()> {
    validate_attempts("probe.max-attempts", config.max_attempts)
}

/// Validates expiry lookup configuration
fn validate_expiry_config(config: &ExpiryConfig) -> ConfigResult<()> {
    let base = Url::parse(&config.rdap_base_url).map_err(|e| {
        ConfigError::Validation(format!(
            "Invalid expiry.rdap-base-url '{}': {}",
            config.rdap_base_url, e
        ))
    })?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "expiry.rdap-base-url must use http or https, got {}",
            base.scheme()
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "expiry.timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}
