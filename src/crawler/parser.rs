//! Record extraction from listing and detail pages
//!
//! The listing endpoint answers with a JSON envelope whose payload field holds
//! an HTML fragment. Each repeated entity block inside that fragment becomes one
//! [`PartialRecord`]. Detail pages are plain HTML and yield the external site link.

use crate::config::{parse_selector, Config};
use crate::record::PartialRecord;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Errors raised when a listing response has an unexpected shape
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Listing response is not valid JSON: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),

    #[error("Listing response has no string field '{0}'")]
    MissingPayload(String),
}

/// Turns raw page payloads into records
///
/// Implementations are stateless: the same input always yields the same output.
pub trait RecordExtractor: Send + Sync {
    /// Parses one listing response into zero or more partial records
    ///
    /// An empty fragment, or one with no entity blocks, yields `Ok(vec![])`:
    /// that is the normal end-of-data signal. A malformed envelope is an error.
    fn extract_records(&self, body: &[u8]) -> Result<Vec<PartialRecord>, ExtractError>;

    /// Extracts the external site URL from a detail page, empty if absent
    fn extract_site_url(&self, html: &str) -> String;
}

/// Selectors compiled once from configuration
#[derive(Debug, Clone)]
struct CompiledSelectors {
    item: Selector,
    name: Selector,
    image: Selector,
    locations: Selector,
    description: Selector,
    detail_link: Selector,
    website_link: Selector,
}

/// CSS-selector driven [`RecordExtractor`]
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    payload_field: String,

    /// Base for resolving relative image and detail links
    base_url: Url,

    selectors: CompiledSelectors,
}

impl HtmlExtractor {
    /// Builds an extractor from the `[site]` and `[selectors]` sections
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.site.listing_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid listing_url '{}': {}", config.site.listing_url, e))
        })?;
        let s = &config.selectors;

        Ok(Self {
            payload_field: config.site.payload_field.clone(),
            base_url,
            selectors: CompiledSelectors {
                item: parse_selector("item", &s.item)?,
                name: parse_selector("name", &s.name)?,
                image: parse_selector("image", &s.image)?,
                locations: parse_selector("locations", &s.locations)?,
                description: parse_selector("description", &s.description)?,
                detail_link: parse_selector("detail-link", &s.detail_link)?,
                website_link: parse_selector("website-link", &s.website_link)?,
            },
        })
    }

    /// Pulls the HTML fragment out of the JSON envelope
    fn payload<'a>(&self, envelope: &'a serde_json::Value) -> Result<&'a str, ExtractError> {
        envelope
            .get(&self.payload_field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ExtractError::MissingPayload(self.payload_field.clone()))
    }

    fn extract_block(&self, block: ElementRef<'_>) -> PartialRecord {
        let sel = &self.selectors;

        let image_url = block
            .select(&sel.image)
            .next()
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .map(|src| resolve_link(src, &self.base_url))
            .unwrap_or_default();

        let source_url = block
            .select(&sel.detail_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_link(href, &self.base_url))
            .unwrap_or_default();

        PartialRecord {
            name: first_text(block, &sel.name),
            image_url,
            locations: split_locations(&first_text(block, &sel.locations)),
            description: first_text(block, &sel.description),
            source_url,
        }
    }
}

impl RecordExtractor for HtmlExtractor {
    fn extract_records(&self, body: &[u8]) -> Result<Vec<PartialRecord>, ExtractError> {
        let envelope: serde_json::Value = serde_json::from_slice(body)?;
        let fragment = self.payload(&envelope)?;

        if fragment.trim().is_empty() {
            return Ok(Vec::new());
        }

        let html = Html::parse_fragment(fragment);
        let records = html
            .select(&self.selectors.item)
            .map(|block| self.extract_block(block))
            .collect();

        Ok(records)
    }

    fn extract_site_url(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        document
            .select(&self.selectors.website_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim().to_string())
            .unwrap_or_default()
    }
}

/// Extracts the session token from the landing page
///
/// Reads the `content` attribute (meta tags), then `value` (hidden inputs).
pub fn extract_token(html: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .find_map(|element| {
            element
                .value()
                .attr("content")
                .or_else(|| element.value().attr("value"))
                .map(|v| v.trim().to_string())
        })
        .filter(|token| !token.is_empty())
}

/// Whitespace-collapsed text of the first match, empty if none
fn first_text(block: ElementRef<'_>, selector: &Selector) -> String {
    block
        .select(selector)
        .next()
        .map(|element| {
            element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Splits a comma-separated location list, dropping empty entries
fn split_locations(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves a link against the listing base URL
///
/// Unresolvable links are kept as written rather than dropped.
fn resolve_link(href: &str, base_url: &Url) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }

    match base_url.join(href) {
        Ok(absolute) => absolute.to_string(),
        Err(_) => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> HtmlExtractor {
        let config = Config::for_site(
            "https://example.com/directory",
            "https://example.com/directory/more",
        );
        HtmlExtractor::from_config(&config).unwrap()
    }

    fn envelope(fragment: &str) -> Vec<u8> {
        serde_json::json!({ "html": fragment, "count": 20 })
            .to_string()
            .into_bytes()
    }

    const TWO_BLOCKS: &str = r#"
        <div class="listing-item">
            <img src="/img/acme.png">
            <h3 class="listing-name">  Acme   Corp </h3>
            <p class="listing-locations">Berlin, Paris ,  Lisbon</p>
            <p class="listing-description">Makes
                widgets.</p>
            <a class="listing-link" href="/companies/acme">More</a>
        </div>
        <div class="listing-item">
            <h3 class="listing-name">Globex</h3>
            <p class="listing-locations">Springfield</p>
            <p class="listing-description">Does things.</p>
            <a class="listing-link" href="https://example.com/companies/globex">More</a>
        </div>
    "#;

    #[test]
    fn test_extract_two_blocks_one_missing_image() {
        let records = extractor().extract_records(&envelope(TWO_BLOCKS)).unwrap();
        assert_eq!(records.len(), 2);

        let acme = &records[0];
        assert_eq!(acme.name, "Acme Corp");
        assert_eq!(acme.image_url, "https://example.com/img/acme.png");
        assert_eq!(acme.locations, vec!["Berlin", "Paris", "Lisbon"]);
        assert_eq!(acme.description, "Makes widgets.");
        assert_eq!(acme.source_url, "https://example.com/companies/acme");

        let globex = &records[1];
        assert_eq!(globex.image_url, "");
        assert_eq!(globex.name, "Globex");
        assert_eq!(globex.locations, vec!["Springfield"]);
        assert_eq!(globex.description, "Does things.");
        assert_eq!(globex.source_url, "https://example.com/companies/globex");
    }

    #[test]
    fn test_lazy_image_source() {
        let fragment = r#"<div class="listing-item"><img data-src="https://cdn.example.com/x.png"><span class="listing-name">X</span></div>"#;
        let records = extractor().extract_records(&envelope(fragment)).unwrap();
        assert_eq!(records[0].image_url, "https://cdn.example.com/x.png");
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let fragment = r#"<div class="listing-item"></div>"#;
        let records = extractor().extract_records(&envelope(fragment)).unwrap();
        assert_eq!(records, vec![PartialRecord::default()]);
    }

    #[test]
    fn test_empty_payload_is_end_of_data() {
        let records = extractor().extract_records(&envelope("   ")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_payload_without_blocks_is_end_of_data() {
        let records = extractor()
            .extract_records(&envelope("<p>No more results</p>"))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let result = extractor().extract_records(b"<html>Server error</html>");
        assert!(matches!(result, Err(ExtractError::InvalidEnvelope(_))));
    }

    #[test]
    fn test_missing_payload_field_is_an_error() {
        let body = serde_json::json!({ "status": "ok" }).to_string();
        let result = extractor().extract_records(body.as_bytes());
        assert!(matches!(result, Err(ExtractError::MissingPayload(field)) if field == "html"));
    }

    #[test]
    fn test_custom_payload_field() {
        let mut config = Config::for_site(
            "https://example.com/directory",
            "https://example.com/directory/more",
        );
        config.site.payload_field = "content".to_string();
        let extractor = HtmlExtractor::from_config(&config).unwrap();

        let body = serde_json::json!({ "content": TWO_BLOCKS }).to_string();
        assert_eq!(extractor.extract_records(body.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn test_extract_site_url() {
        let html = r#"<html><body>
            <a href="/back">Back</a>
            <a class="website-link" href=" https://acme.example/ ">Visit website</a>
        </body></html>"#;
        assert_eq!(extractor().extract_site_url(html), "https://acme.example/");
    }

    #[test]
    fn test_extract_site_url_missing() {
        let html = r#"<html><body><a href="/back">Back</a></body></html>"#;
        assert_eq!(extractor().extract_site_url(html), "");
    }

    #[test]
    fn test_extract_token_from_meta() {
        let selector = Selector::parse(r#"meta[name="csrf-token"]"#).unwrap();
        let html = r#"<html><head><meta name="csrf-token" content="tok-123"></head></html>"#;
        assert_eq!(extract_token(html, &selector), Some("tok-123".to_string()));
    }

    #[test]
    fn test_extract_token_from_hidden_input() {
        let selector = Selector::parse(r#"input[name="_token"]"#).unwrap();
        let html = r#"<form><input type="hidden" name="_token" value="abc"></form>"#;
        assert_eq!(extract_token(html, &selector), Some("abc".to_string()));
    }

    #[test]
    fn test_extract_token_missing_or_empty() {
        let selector = Selector::parse(r#"meta[name="csrf-token"]"#).unwrap();
        assert_eq!(extract_token("<html></html>", &selector), None);
        assert_eq!(
            extract_token(r#"<meta name="csrf-token" content="">"#, &selector),
            None
        );
    }

    #[test]
    fn test_split_locations() {
        assert_eq!(split_locations("A, B,,C "), vec!["A", "B", "C"]);
        assert!(split_locations("").is_empty());
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse("https://example.com/directory/more").unwrap();
        assert_eq!(resolve_link("/x", &base), "https://example.com/x");
        assert_eq!(resolve_link("", &base), "");
        assert_eq!(resolve_link("https://other.com/y", &base), "https://other.com/y");
    }
}
