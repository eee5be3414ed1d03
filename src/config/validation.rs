use crate::config::types::{
    Config, CrawlerConfig, FetchConfig, MediaConfig, OutputConfig, PolicyConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_policy_config(&config.policy)?;
    validate_fetch_config(&config.fetch)?;
    validate_media_config(&config.media)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_seed(&config.seed)?;

    if config.max_concurrency < 1 || config.max_concurrency > 256 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 256, got {}",
            config.max_concurrency
        )));
    }

    Ok(())
}

/// Validates that a seed is an absolute HTTP(S) URL with a host
pub(crate) fn validate_seed(seed: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(url)
}

/// Validates scope policy configuration
fn validate_policy_config(config: &PolicyConfig) -> Result<(), ConfigError> {
    if let Some(pattern) = &config.link_regex {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("link_regex '{}' does not compile: {}", pattern, e))
        })?;
    }

    if let Some(keyword) = &config.keyword_filter {
        if keyword.trim().is_empty() {
            return Err(ConfigError::Validation(
                "keyword_filter cannot be blank; omit it to disable filtering".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 || config.render_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch timeouts must be at least one second".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_cap_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_cap_ms ({}) must not be below backoff_base_ms ({})",
            config.backoff_cap_ms, config.backoff_base_ms
        )));
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents entries cannot be empty".to_string(),
        ));
    }

    if config.robots_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "robots_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates media configuration
fn validate_media_config(config: &MediaConfig) -> Result<(), ConfigError> {
    if config.enabled && config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "media directory cannot be empty when media download is enabled".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "media timeout must be at least one second".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.state_dir, Some(dir) if dir.is_empty()) {
        return Err(ConfigError::Validation(
            "state_dir cannot be empty; omit it to disable resumable state".to_string(),
        ));
    }

    Ok(())
}
