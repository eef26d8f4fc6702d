//! External collaborators: listing-page discovery and article extraction.
//!
//! Both sit behind narrow traits so the pipeline can be driven with fakes;
//! the HTML implementations use a shared reqwest client and CSS selectors
//! from the source registry.

use std::time::Duration;

use async_trait::async_trait;
use mint_core::{RawContent, SourceItem};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const CRATE_NAME: &str = "mint-adapters";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("invalid base url `{0}`")]
    BaseUrl(String),
    #[error("no content extracted from {0}")]
    EmptyContent(String),
}

/// One entry of the source registry (`sources.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSite {
    pub name: String,
    pub listing_url: String,
    /// Selector matching the anchor elements on the listing page.
    pub listing_selector: String,
    /// Selector scoping the article body on a detail page.
    pub content_selector: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_items() -> usize {
    15
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: "newsmint/0.1".to_string(),
        }
    }
}

pub fn build_client(config: &HttpClientConfig) -> Result<Client, FetchError> {
    Ok(Client::builder()
        .gzip(true)
        .brotli(true)
        .timeout(config.timeout)
        .user_agent(config.user_agent.clone())
        .build()?)
}

/// Produces the bounded, ordered list of candidate items for one run.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    async fn discover(&self) -> Result<Vec<SourceItem>, FetchError>;
}

/// Fetches and extracts the full content behind one origin URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, origin_url: &str) -> Result<RawContent, FetchError>;
}

pub struct HtmlSourceCatalog {
    client: Client,
    sites: Vec<SourceSite>,
}

impl HtmlSourceCatalog {
    pub fn new(client: Client, sites: Vec<SourceSite>) -> Self {
        Self { client, sites }
    }

    async fn discover_site(&self, site: &SourceSite) -> Result<Vec<SourceItem>, FetchError> {
        let body = get_text(&self.client, &site.listing_url).await?;
        let items = parse_listing(site, &body)?;
        debug!(source = %site.name, items = items.len(), "parsed listing");
        Ok(items)
    }
}

#[async_trait]
impl SourceCatalog for HtmlSourceCatalog {
    async fn discover(&self) -> Result<Vec<SourceItem>, FetchError> {
        let mut items = Vec::new();
        for site in self.sites.iter().filter(|s| s.enabled) {
            match self.discover_site(site).await {
                Ok(mut found) => items.append(&mut found),
                // One broken source must not empty the whole catalog.
                Err(err) => warn!(source = %site.name, error = %err, "listing discovery failed"),
            }
        }
        Ok(items)
    }
}

const FALLBACK_CONTENT_SELECTOR: &str = ".entry-content";

pub struct HtmlContentFetcher {
    client: Client,
    sites: Vec<SourceSite>,
}

impl HtmlContentFetcher {
    pub fn new(client: Client, sites: Vec<SourceSite>) -> Self {
        Self { client, sites }
    }

    /// Content selector for the site whose listing host matches the origin
    /// URL, falling back to a conventional article-body selector.
    fn content_selector_for(&self, origin_url: &str) -> &str {
        let origin_host = Url::parse(origin_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        if let Some(origin_host) = origin_host {
            for site in &self.sites {
                let site_host = Url::parse(&site.listing_url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string));
                if site_host.as_deref() == Some(origin_host.as_str()) {
                    return &site.content_selector;
                }
            }
        }
        FALLBACK_CONTENT_SELECTOR
    }
}

#[async_trait]
impl ContentFetcher for HtmlContentFetcher {
    async fn fetch(&self, origin_url: &str) -> Result<RawContent, FetchError> {
        let selector = self.content_selector_for(origin_url).to_string();
        let body = get_text(&self.client, origin_url).await?;
        extract_content(&selector, origin_url, &body)
    }
}

async fn get_text(client: &Client, url: &str) -> Result<String, FetchError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: resp.url().to_string(),
        });
    }
    Ok(resp.text().await?)
}

/// Pull (title, absolutized link) pairs out of a listing page.
///
/// Sync on purpose: `scraper::Html` is not `Send`, so all parsing stays out
/// of async scope.
fn parse_listing(site: &SourceSite, body: &str) -> Result<Vec<SourceItem>, FetchError> {
    let selector = Selector::parse(&site.listing_selector)
        .map_err(|_| FetchError::Selector(site.listing_selector.clone()))?;
    let base = Url::parse(&site.listing_url)
        .map_err(|_| FetchError::BaseUrl(site.listing_url.clone()))?;

    let document = Html::parse_document(body);
    let mut items = Vec::new();
    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let title = anchor.text().collect::<String>().trim().to_string();
        let Ok(origin_url) = base.join(href) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        items.push(SourceItem {
            origin_url: origin_url.to_string(),
            title,
            source: site.name.clone(),
        });
        if items.len() >= site.max_items {
            break;
        }
    }
    Ok(items)
}

/// Extract body text and image references scoped by the content selector.
fn extract_content(
    content_selector: &str,
    origin_url: &str,
    body: &str,
) -> Result<RawContent, FetchError> {
    let selector = Selector::parse(content_selector)
        .map_err(|_| FetchError::Selector(content_selector.to_string()))?;
    let img_selector =
        Selector::parse("img").map_err(|_| FetchError::Selector("img".to_string()))?;
    let base =
        Url::parse(origin_url).map_err(|_| FetchError::BaseUrl(origin_url.to_string()))?;

    let document = Html::parse_document(body);
    let mut text_parts = Vec::new();
    let mut images = Vec::new();
    for scope in document.select(&selector) {
        let text = scope.text().collect::<String>();
        let text = text.trim();
        if !text.is_empty() {
            text_parts.push(text.to_string());
        }
        for img in scope.select(&img_selector) {
            if let Some(src) = img.value().attr("src") {
                if let Ok(absolute) = base.join(src) {
                    images.push(absolute.to_string());
                }
            }
        }
    }

    let body_text = text_parts.join("\n");
    if body_text.is_empty() {
        return Err(FetchError::EmptyContent(origin_url.to_string()));
    }
    Ok(RawContent {
        body: body_text,
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SourceSite {
        SourceSite {
            name: "Example News".into(),
            listing_url: "https://news.example.com/category/latest".into(),
            listing_selector: ".headline a".into(),
            content_selector: ".entry-content".into(),
            max_items: 2,
            enabled: true,
        }
    }

    const LISTING: &str = r#"
        <div class="headline"><a href="/story/one">First Story</a></div>
        <div class="headline"><a href="https://news.example.com/story/two">Second Story</a></div>
        <div class="headline"><a href="/story/three">Third Story</a></div>
        <div class="headline"><a>No Link</a></div>
    "#;

    #[test]
    fn listing_absolutizes_links_and_caps_items() {
        let items = parse_listing(&site(), LISTING).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].origin_url, "https://news.example.com/story/one");
        assert_eq!(items[0].title, "First Story");
        assert_eq!(items[0].source, "Example News");
        assert_eq!(items[1].origin_url, "https://news.example.com/story/two");
    }

    #[test]
    fn listing_rejects_bad_selector() {
        let mut bad = site();
        bad.listing_selector = ":::".into();
        assert!(matches!(
            parse_listing(&bad, LISTING),
            Err(FetchError::Selector(_))
        ));
    }

    const ARTICLE: &str = r#"
        <div class="entry-content">
          <p>Lead paragraph.</p>
          <img src="/images/a.jpg">
          <img src="https://cdn.example.com/b.jpg">
          <p>Second paragraph.</p>
        </div>
        <div class="sidebar"><img src="/ads/banner.jpg"></div>
    "#;

    #[test]
    fn content_extraction_collects_text_and_scoped_images() {
        let raw =
            extract_content(".entry-content", "https://news.example.com/story/one", ARTICLE)
                .unwrap();
        assert!(raw.body.contains("Lead paragraph."));
        assert!(raw.body.contains("Second paragraph."));
        assert_eq!(
            raw.images,
            vec![
                "https://news.example.com/images/a.jpg",
                "https://cdn.example.com/b.jpg"
            ]
        );
    }

    #[test]
    fn empty_content_is_a_typed_error() {
        let result = extract_content(
            ".entry-content",
            "https://news.example.com/story/one",
            "<div class=\"other\">nothing here</div>",
        );
        assert!(matches!(result, Err(FetchError::EmptyContent(_))));
    }

    #[test]
    fn content_selector_matches_site_by_host() {
        let client = build_client(&HttpClientConfig::default()).unwrap();
        let mut other = site();
        other.name = "Other".into();
        other.listing_url = "https://other.example.org/latest".into();
        other.content_selector = ".article-body".into();
        let fetcher = HtmlContentFetcher::new(client, vec![site(), other]);

        assert_eq!(
            fetcher.content_selector_for("https://news.example.com/story/one"),
            ".entry-content"
        );
        assert_eq!(
            fetcher.content_selector_for("https://other.example.org/story/two"),
            ".article-body"
        );
        assert_eq!(
            fetcher.content_selector_for("https://unknown.example.net/x"),
            FALLBACK_CONTENT_SELECTOR
        );
    }

    #[test]
    fn registry_defaults_apply() {
        let parsed: SourceSite = serde_yaml_like();
        assert_eq!(parsed.max_items, 15);
        assert!(parsed.enabled);
    }

    fn serde_yaml_like() -> SourceSite {
        serde_json::from_str(
            r#"{
                "name": "Example",
                "listing_url": "https://news.example.com/",
                "listing_selector": ".headline a",
                "content_selector": ".entry-content"
            }"#,
        )
        .unwrap()
    }
}
