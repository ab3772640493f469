//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester:
//! - Building the shared HTTP client with browser-like identification
//! - Fetching the session token from the landing page
//! - POSTing paginated listing requests
//! - Fetching detail pages for enrichment
//!
//! Nothing here retries. A failed request is reported once and the caller
//! decides what it means.

use crate::config::{parse_selector, Config, HttpConfig, SiteConfig};
use crate::crawler::parser::extract_token;
use crate::ConfigError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use scraper::Selector;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures reaching the listing or a detail page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("No session token found on {url}")]
    MissingToken { url: String },
}

/// Raw listing response for one offset
#[derive(Debug, Clone)]
pub struct RawPage {
    /// HTTP status code
    pub status: u16,

    /// Response body as received
    pub body: Vec<u8>,
}

impl RawPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network side of the harvester
///
/// Implementations must be usable from many tasks at once; the scheduler keeps
/// up to its concurrency ceiling of requests outstanding.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches the session token required by listing requests
    async fn fetch_token(&self) -> Result<String, FetchError>;

    /// Requests the listing page starting at `offset`
    ///
    /// Non-2xx responses are returned as a `RawPage`; only transport failures are errors.
    async fn fetch_listing_page(&self, offset: u64, token: &str) -> Result<RawPage, FetchError>;

    /// Fetches a detail page body
    async fn fetch_detail_page(&self, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// The cookie store is enabled because the session token is only honoured
/// together with the session cookie set by the landing page. Every request
/// carries the [`session_headers`].
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(session_headers(config))
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Headers sent with the token, listing and detail requests alike
pub fn session_headers(config: &HttpConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&config.accept_language) {
        Ok(language) => {
            headers.insert(ACCEPT_LANGUAGE, language);
        }
        Err(_) => tracing::warn!(
            "Not sending Accept-Language '{}': invalid header value",
            config.accept_language.escape_debug()
        ),
    }
    headers
}

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");
const X_CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrf-token");

/// Headers the listing endpoint expects on its XHR pagination requests
pub fn listing_headers(site: &SiteConfig, token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    if let Ok(referer) = HeaderValue::from_str(&site.landing_url) {
        headers.insert(REFERER, referer);
    }
    if let Ok(token) = HeaderValue::from_str(token) {
        headers.insert(X_CSRF_TOKEN, token);
    }
    headers
}

/// reqwest-backed [`PageFetcher`]
pub struct HttpFetcher {
    client: Client,
    site: SiteConfig,
    token_selector: Selector,
}

impl HttpFetcher {
    pub fn new(client: Client, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            site: config.site.clone(),
            token_selector: parse_selector("token", &config.selectors.token)?,
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| http_error(url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| http_error(url, source))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_token(&self) -> Result<String, FetchError> {
        let url = &self.site.landing_url;
        let html = self.get_text(url).await?;

        extract_token(&html, &self.token_selector)
            .ok_or_else(|| FetchError::MissingToken { url: url.clone() })
    }

    async fn fetch_listing_page(&self, offset: u64, token: &str) -> Result<RawPage, FetchError> {
        let url = &self.site.listing_url;
        let form = [
            (self.site.token_field.as_str(), token.to_string()),
            (self.site.offset_field.as_str(), offset.to_string()),
        ];

        let response = self
            .client
            .post(url)
            .headers(listing_headers(&self.site, token))
            .form(&form)
            .send()
            .await
            .map_err(|source| http_error(url, source))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|source| http_error(url, source))?;

        Ok(RawPage {
            status,
            body: body.to_vec(),
        })
    }

    async fn fetch_detail_page(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await
    }
}

fn http_error(url: &str, source: reqwest::Error) -> FetchError {
    FetchError::Http {
        url: url.to_string(),
        source,
    }
}
