use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, StoreBackend, StoreConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_store_config(&config.store)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 1000 {
        return Err(ConfigError::Validation(format!(
            "max-workers must be between 1 and 1000, got {}",
            config.max_workers
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(
            "max-retries must be >= 1".to_string(),
        ));
    }

    if config.robots_retries < 1 || config.sitemap_retries < 1 {
        return Err(ConfigError::Validation(
            "robots-retries and sitemap-retries must be >= 1".to_string(),
        ));
    }

    if config.max_store_failures < 1 {
        return Err(ConfigError::Validation(
            "max-store-failures must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    // Workers renew their claim after every fetch and every cooldown wait
    let renewal_gap = config
        .crawl_delay
        .saturating_add(config.request_timeout_secs.saturating_mul(u64::from(config.max_retries)));
    if config.claim_lease_secs <= renewal_gap {
        return Err(ConfigError::Validation(format!(
            "claim-lease-secs must exceed crawl-delay plus request-timeout-secs * max-retries ({}s), got {}",
            renewal_gap, config.claim_lease_secs
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters, '-' and '_', got '{}'",
            config.name
        )));
    }

    if config.header.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent header cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the frontier backend settings for the selected backend
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    match config.backend {
        StoreBackend::Sqlite => {
            if config.path.is_empty() {
                return Err(ConfigError::Validation(
                    "store path cannot be empty for the sqlite backend".to_string(),
                ));
            }
        }
        StoreBackend::Redis => {
            let url = Url::parse(&config.url)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid store url: {}", e)))?;
            if !matches!(url.scheme(), "redis" | "rediss") {
                return Err(ConfigError::Validation(format!(
                    "store url must use redis:// or rediss://, got '{}'",
                    config.url
                )));
            }
            if config.namespace.is_empty() {
                return Err(ConfigError::Validation(
                    "store namespace cannot be empty".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(
            "queue-capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", seed, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "'{}' must use http or https",
                seed
            )));
        }
    }

    Ok(())
}
