use crate::config::types::{Config, CrawlerConfig, OutputConfig, SourceEntry, UserAgentConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Upper bound for a single backoff setting (ten minutes)
const MAX_BACKOFF_MS: u64 = 600_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates fetch behavior configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_base_ms > MAX_BACKOFF_MS || config.backoff_step_ms > MAX_BACKOFF_MS {
        return Err(ConfigError::Validation(format!(
            "backoff-base-ms and backoff-step-ms must be <= {}, got {} and {}",
            MAX_BACKOFF_MS, config.backoff_base_ms, config.backoff_step_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output-path cannot be empty".to_string(),
        ));
    }

    if let Some(fallback) = &config.fallback_cover_url {
        validate_http_url(fallback, "fallback-cover-url")?;
    }

    Ok(())
}

/// Validates the generic HTTP source entries
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    for entry in sources {
        validate_http_url(&entry.base_url, "source base-url")?;

        Selector::parse(&entry.content_selector).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid content-selector '{}' for {}: {:?}",
                entry.content_selector, entry.base_url, e
            ))
        })?;

        for selector in &entry.remove_selectors {
            Selector::parse(selector).map_err(|e| {
                ConfigError::Validation(format!(
                    "Invalid remove-selector '{}' for {}: {:?}",
                    selector, entry.base_url, e
                ))
            })?;
        }
    }

    Ok(())
}

fn validate_http_url(value: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use HTTP or HTTPS",
            field, value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid contact_email: '{}'",
            email
        )));
    }

    Ok(())
}
