use crate::config::types::{Config, CrawlerConfig, FetchConfig, OutputConfig, SiteConfig};
use crate::ConfigError;
use url::Url;

const MAX_IN_FLIGHT: u32 = 32;
const MAX_RETRIES: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_fetch_config(&config.fetch)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the catalog location
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    if let Some(asset_root) = &config.asset_root {
        validate_http_url("asset-root", asset_root)?;
    }

    if !config.listing_path.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "listing-path must contain a {{page}} placeholder, got '{}'",
            config.listing_path
        )));
    }

    Ok(())
}

/// Validates HTTP fetch settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-secs must be >= 1, got {}",
            config.connect_timeout_secs
        )));
    }

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    Ok(())
}

/// Validates pipeline settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_in_flight < 1 || config.max_in_flight > MAX_IN_FLIGHT {
        return Err(ConfigError::Validation(format!(
            "max-in-flight must be between 1 and {}, got {}",
            MAX_IN_FLIGHT, config.max_in_flight
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "deadline-secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.dataset_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dataset-path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.seed_path, Some(path) if path.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "seed-path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a configured URL parses and uses HTTP(S)
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
