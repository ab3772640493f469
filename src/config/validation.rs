use crate::config::types::{
    Config, CrawlerConfig, DatabaseConfig, HttpConfig, SelectorConfig, SiteConfig,
};
use crate::storage::is_valid_table_name;
use crate::ConfigError;
use reqwest::header::HeaderValue;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_http_config(&config.http)?;
    validate_database_config(&config.database, config.pool_size(), &config.crawler)?;
    validate_selectors(&config.selectors)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if let Some(limit) = config.enrich_concurrency {
        if limit < 1 || limit > 100 {
            return Err(ConfigError::Validation(format!(
                "enrich_concurrency must be between 1 and 100, got {}",
                limit
            )));
        }
    }

    if config.page_stride < 1 {
        return Err(ConfigError::Validation(format!(
            "page_stride must be >= 1, got {}",
            config.page_stride
        )));
    }

    Ok(())
}

/// Validates the remote site endpoints and form field names
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("landing_url", &config.landing_url)?;
    validate_http_url("listing_url", &config.listing_url)?;

    for (field, value) in [
        ("token_field", &config.token_field),
        ("offset_field", &config.offset_field),
        ("payload_field", &config.payload_field),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", field)));
        }
    }

    Ok(())
}

/// Validates HTTP client settings
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "HTTP timeouts must be at least 1 second".to_string(),
        ));
    }

    if HeaderValue::from_str(&config.accept_language).is_err() {
        return Err(ConfigError::Validation(format!(
            "accept_language '{}' is not a valid header value",
            config.accept_language.escape_debug()
        )));
    }

    Ok(())
}

/// Validates database configuration
fn validate_database_config(
    config: &DatabaseConfig,
    pool_size: u32,
    crawler: &CrawlerConfig,
) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }

    if !is_valid_table_name(&config.table) {
        return Err(ConfigError::Validation(format!(
            "table name '{}' must be an identifier of letters, digits and underscores",
            config.table
        )));
    }

    // A smaller pool would leave running tasks waiting on each other for connections
    if pool_size < crawler.concurrency {
        return Err(ConfigError::Validation(format!(
            "pool_size ({}) must be >= concurrency ({})",
            pool_size, crawler.concurrency
        )));
    }

    Ok(())
}

/// Checks that every selector parses
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (field, css) in [
        ("token", &config.token),
        ("item", &config.item),
        ("name", &config.name),
        ("image", &config.image),
        ("locations", &config.locations),
        ("description", &config.description),
        ("detail-link", &config.detail_link),
        ("website-link", &config.website_link),
    ] {
        parse_selector(field, css)?;
    }
    Ok(())
}

/// Parses a CSS selector, naming the config field on failure
pub fn parse_selector(field: &str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css)
        .map_err(|e| ConfigError::InvalidSelector(format!("{} = '{}': {:?}", field, css, e)))
}

/// Accepts absolute http(s) URLs only
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
