use serde::Deserialize;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Config {
    /// Builds a configuration for the given site with every other section defaulted
    pub fn for_site(landing_url: &str, listing_url: &str) -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            site: SiteConfig {
                landing_url: landing_url.to_string(),
                listing_url: listing_url.to_string(),
                token_field: default_token_field(),
                offset_field: default_offset_field(),
                payload_field: default_payload_field(),
            },
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            selectors: SelectorConfig::default(),
        }
    }

    /// Number of pooled database connections
    ///
    /// Falls back to the concurrency ceiling so every running task can hold one.
    pub fn pool_size(&self) -> u32 {
        self.database
            .pool_size
            .unwrap_or(self.crawler.concurrency)
    }

    /// Detail pages one task may fetch at once
    ///
    /// Falls back to the concurrency ceiling.
    pub fn enrich_concurrency(&self) -> u32 {
        self.crawler
            .enrich_concurrency
            .unwrap_or(self.crawler.concurrency)
    }
}

/// Crawl scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of page tasks in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Increment between successive page offsets
    #[serde(rename = "page-stride", default = "default_page_stride")]
    pub page_stride: u64,

    /// Highest offset that will ever be requested (inclusive)
    #[serde(rename = "max-offset", default = "default_max_offset")]
    pub max_offset: u64,

    /// Concurrent detail-page lookups per task
    #[serde(rename = "enrich-concurrency", default)]
    pub enrich_concurrency: Option<u32>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            page_stride: default_page_stride(),
            max_offset: default_max_offset(),
            enrich_concurrency: None,
        }
    }
}

/// Remote listing endpoints and request field names
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Landing page that serves the session token
    #[serde(rename = "landing-url")]
    pub landing_url: String,

    /// Endpoint that serves paginated fragments
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Form field carrying the session token
    #[serde(rename = "token-field", default = "default_token_field")]
    pub token_field: String,

    /// Form field carrying the page offset
    #[serde(rename = "offset-field", default = "default_offset_field")]
    pub offset_field: String,

    /// JSON field of the listing response holding the HTML fragment
    #[serde(rename = "payload-field", default = "default_payload_field")]
    pub payload_field: String,
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// `Accept-Language` sent with every request
    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            accept_language: default_accept_language(),
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Table receiving harvested records
    #[serde(default = "default_table")]
    pub table: String,

    /// Pooled connection count, defaults to the concurrency ceiling
    #[serde(rename = "pool-size", default)]
    pub pool_size: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            table: default_table(),
            pool_size: None,
        }
    }
}

/// CSS selectors used to pick fields out of listing and detail pages
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Element carrying the session token on the landing page
    #[serde(default = "default_token_selector")]
    pub token: String,

    /// One repeated entity block in the listing fragment
    #[serde(default = "default_item_selector")]
    pub item: String,

    #[serde(default = "default_name_selector")]
    pub name: String,

    #[serde(default = "default_image_selector")]
    pub image: String,

    #[serde(default = "default_locations_selector")]
    pub locations: String,

    #[serde(default = "default_description_selector")]
    pub description: String,

    /// Link from an entity block to its detail page
    #[serde(rename = "detail-link", default = "default_detail_link_selector")]
    pub detail_link: String,

    /// Link on the detail page pointing at the entity's own site
    #[serde(rename = "website-link", default = "default_website_link_selector")]
    pub website_link: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            token: default_token_selector(),
            item: default_item_selector(),
            name: default_name_selector(),
            image: default_image_selector(),
            locations: default_locations_selector(),
            description: default_description_selector(),
            detail_link: default_detail_link_selector(),
            website_link: default_website_link_selector(),
        }
    }
}

fn default_concurrency() -> u32 {
    5
}

fn default_page_stride() -> u64 {
    20
}

fn default_max_offset() -> u64 {
    9999
}

fn default_token_field() -> String {
    "_token".to_string()
}

fn default_offset_field() -> String {
    "offset".to_string()
}

fn default_payload_field() -> String {
    "html".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_accept_language() -> String {
    "en-US,en;q=0.5".to_string()
}

fn default_database_path() -> String {
    "harvest.db".to_string()
}

fn default_table() -> String {
    "listings".to_string()
}

fn default_token_selector() -> String {
    r#"meta[name="csrf-token"]"#.to_string()
}

fn default_item_selector() -> String {
    ".listing-item".to_string()
}

fn default_name_selector() -> String {
    ".listing-name".to_string()
}

fn default_image_selector() -> String {
    "img".to_string()
}

fn default_locations_selector() -> String {
    ".listing-locations".to_string()
}

fn default_description_selector() -> String {
    ".listing-description".to_string()
}

fn default_detail_link_selector() -> String {
    "a.listing-link".to_string()
}

fn default_website_link_selector() -> String {
    "a.website-link".to_string()
}
