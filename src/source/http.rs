//! Selector-driven HTTP content source
//!
//! This module handles plain HTML sites described in the `[[source]]`
//! configuration tables:
//! - Building the shared HTTP client with a proper user agent string
//! - GET requests for chapter pages and binary resources
//! - Error classification into transient and adapter failures
//! - Extracting the chapter content element and dropping clutter

use crate::book::Chapter;
use crate::config::{SourceEntry, UserAgentConfig};
use crate::crawler::parser::{render_inner, Rewrite};
use crate::source::{ContentSource, SourceError, SourceResult};
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;

/// Elements that never belong in a chapter body
const ALWAYS_REMOVED: &[&str] = &["script", "style", "noscript", "iframe"];

/// Accept header sent for binary resources
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total timeout for a single request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use novel_harvest::config::UserAgentConfig;
/// use novel_harvest::source::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "NovelHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Content source for sites whose chapter text sits in one selectable element
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    content_selector: Selector,
    remove_selectors: Vec<Selector>,
}

impl HttpSource {
    /// Creates a source from a `[[source]]` entry
    ///
    /// # Returns
    ///
    /// * `Ok(HttpSource)` - The selectors parsed
    /// * `Err(SourceError::Adapter)` - A selector is invalid
    pub fn new(client: Client, entry: &SourceEntry) -> SourceResult<Self> {
        let content_selector = parse_selector(&entry.content_selector)?;
        let remove_selectors = entry
            .remove_selectors
            .iter()
            .map(|s| parse_selector(s))
            .collect::<SourceResult<Vec<_>>>()?;

        Ok(Self {
            client,
            base_url: entry.base_url.clone(),
            content_selector,
            remove_selectors,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str, accept: Option<&str>) -> SourceResult<Response> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(header::ACCEPT, accept);
        }

        let response = request.send().await.map_err(|e| classify_request_error(url, e))?;
        check_status(url, response.status())?;
        Ok(response)
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn fetch_chapter_body(&self, chapter: &Chapter) -> SourceResult<String> {
        tracing::debug!("Fetching chapter {} from {}", chapter.id, chapter.url);

        let response = self.get(&chapter.url, None).await?;
        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Fetch(format!("{}: {}", chapter.url, e)))?;

        extract_content(&html, &self.content_selector, &self.remove_selectors)
            .map_err(|e| SourceError::Adapter(format!("{}: {}", chapter.url, e)))
    }

    async fn fetch_bytes(&self, url: &str) -> SourceResult<Vec<u8>> {
        tracing::debug!("Fetching bytes from {}", url);

        let response = self.get(url, Some(IMAGE_ACCEPT)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Fetch(format!("{}: {}", url, e)))?;

        Ok(bytes.to_vec())
    }
}

/// Pulls the content element out of a page and renders its cleaned inner HTML
///
/// Kept synchronous because the parsed document cannot be held across an
/// await point.
pub(crate) fn extract_content(
    html: &str,
    content_selector: &Selector,
    remove_selectors: &[Selector],
) -> Result<String, String> {
    let document = Html::parse_document(html);
    let content = document
        .select(content_selector)
        .next()
        .ok_or_else(|| "content element not found".to_string())?;

    let removed: Vec<_> = remove_selectors
        .iter()
        .flat_map(|selector| content.select(selector))
        .map(|element| element.id())
        .collect();

    let body = render_inner(&content, |element| {
        if ALWAYS_REMOVED.contains(&element.value().name()) || removed.contains(&element.id()) {
            Rewrite::Remove
        } else {
            Rewrite::Keep
        }
    });

    Ok(body.trim().to_string())
}

fn parse_selector(selector: &str) -> SourceResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| SourceError::Adapter(format!("Invalid selector '{}': {:?}", selector, e)))
}

/// Maps a response status to the retry taxonomy
///
/// | Status | Result |
/// |--------|--------|
/// | 2xx | Ok |
/// | 408, 429, 5xx | `Fetch` (retried) |
/// | anything else | `Adapter` |
fn check_status(url: &str, status: StatusCode) -> SourceResult<()> {
    if status.is_success() {
        return Ok(());
    }

    let message = format!("{} returned HTTP {}", url, status.as_u16());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        Err(SourceError::Fetch(message))
    } else {
        Err(SourceError::Adapter(message))
    }
}

fn classify_request_error(url: &str, error: reqwest::Error) -> SourceError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        SourceError::Fetch(format!("{}: {}", url, error))
    } else {
        SourceError::Adapter(format!("{}: {}", url, error))
    }
}
