//! Page fetcher implementation
//!
//! This module retrieves pages for the crawler, including:
//! - Building the HTTP client with browser-like headers
//! - Static GET requests with a bounded redirect chain
//! - Rendered fetches through a [`PageRenderer`], gated by the render pool
//! - Error classification into [`FetchErrorKind`]

use super::renderer::PageRenderer;
use crate::config::{FetchSettings, Settings};
use crate::FetchErrorKind;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// How a page is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain HTTP GET
    Static,

    /// Headless browser with script execution
    Rendered,
}

/// Outcome of one fetch attempt
///
/// Exactly one of `raw_html` and `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status, when a response was received
    pub status: Option<u16>,

    /// Body, present on success
    pub raw_html: Option<String>,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Why the fetch failed
    pub error: Option<FetchErrorKind>,

    /// Strategy that produced this result
    pub strategy: FetchStrategy,
}

impl FetchResult {
    /// Successful result carrying HTML
    pub fn success(url: Url, strategy: FetchStrategy, status: Option<u16>, html: String) -> Self {
        Self {
            url,
            status,
            raw_html: Some(html),
            content_type: Some("text/html".to_string()),
            error: None,
            strategy,
        }
    }

    /// Failed result
    pub fn failure(url: Url, strategy: FetchStrategy, error: FetchErrorKind) -> Self {
        let status = match &error {
            FetchErrorKind::Http { status } => Some(*status),
            _ => None,
        };
        Self {
            url,
            status,
            raw_html: None,
            content_type: None,
            error: Some(error),
            strategy,
        }
    }

    /// Whether the fetch produced HTML
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.raw_html.is_some()
    }
}

/// Builds the HTTP client used for static fetches
///
/// # Arguments
///
/// * `settings` - Timeouts, redirect limit, and header values
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sitescribe::config::FetchSettings;
/// use sitescribe::crawler::build_http_client;
///
/// let client = build_http_client(&FetchSettings::default()).unwrap();
/// ```
pub fn build_http_client(settings: &FetchSettings) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    if let Ok(value) = HeaderValue::from_str(&settings.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }

    Client::builder()
        .user_agent(settings.user_agent.as_str())
        .default_headers(headers)
        .timeout(settings.static_timeout())
        .connect_timeout(settings.static_timeout().min(Duration::from_secs(10)))
        .redirect(Policy::limited(settings.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages statically or through the renderer
pub struct Fetcher {
    client: Client,
    settings: FetchSettings,
    renderer: Arc<dyn PageRenderer>,
    render_permits: Arc<Semaphore>,
}

impl Fetcher {
    /// Creates a fetcher
    ///
    /// At most `settings.concurrency.render_pool` rendered fetches run at once.
    pub fn new(settings: &Settings, renderer: Arc<dyn PageRenderer>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(&settings.fetch)?,
            settings: settings.fetch.clone(),
            renderer,
            render_permits: Arc::new(Semaphore::new(settings.concurrency.render_pool)),
        })
    }

    /// Fetches `url` with the given strategy
    ///
    /// Never fails: every problem is reported through [`FetchResult::error`].
    pub async fn fetch(&self, url: &Url, strategy: FetchStrategy) -> FetchResult {
        match strategy {
            FetchStrategy::Static => self.fetch_static(url).await,
            FetchStrategy::Rendered => self.fetch_rendered(url).await,
        }
    }

    /// Shuts the renderer down
    pub async fn shutdown(&self) {
        self.renderer.shutdown().await;
    }

    async fn fetch_static(&self, url: &Url) -> FetchResult {
        let response = match self.client.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                return FetchResult::failure(
                    url.clone(),
                    FetchStrategy::Static,
                    classify_request_error(&e, &self.settings),
                )
            }
        };

        let status = response.status();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            debug!("HTTP {} for {}", status.as_u16(), final_url);
            return FetchResult {
                content_type,
                ..FetchResult::failure(
                    final_url,
                    FetchStrategy::Static,
                    FetchErrorKind::Http {
                        status: status.as_u16(),
                    },
                )
            };
        }

        if let Some(ct) = content_type.as_deref() {
            if !is_html_content_type(ct) {
                return FetchResult {
                    status: Some(status.as_u16()),
                    content_type: content_type.clone(),
                    ..FetchResult::failure(
                        final_url,
                        FetchStrategy::Static,
                        FetchErrorKind::UnsupportedContentType {
                            content_type: ct.to_string(),
                        },
                    )
                };
            }
        }

        match response.text().await {
            Ok(body) => FetchResult {
                content_type,
                ..FetchResult::success(final_url, FetchStrategy::Static, Some(status.as_u16()), body)
            },
            Err(e) => FetchResult::failure(
                final_url,
                FetchStrategy::Static,
                classify_request_error(&e, &self.settings),
            ),
        }
    }

    async fn fetch_rendered(&self, url: &Url) -> FetchResult {
        let _permit = match self.render_permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return FetchResult::failure(
                    url.clone(),
                    FetchStrategy::Rendered,
                    FetchErrorKind::Render {
                        message: "render pool closed".to_string(),
                    },
                )
            }
        };

        match self.renderer.render(url, self.settings.render_timeout()).await {
            Ok(page) => FetchResult::success(
                page.final_url.unwrap_or_else(|| url.clone()),
                FetchStrategy::Rendered,
                None,
                page.html,
            ),
            Err(e) => FetchResult::failure(
                url.clone(),
                FetchStrategy::Rendered,
                FetchErrorKind::Render {
                    message: e.to_string(),
                },
            ),
        }
    }
}

/// Whether a Content-Type names an HTML document
pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}

fn classify_request_error(error: &reqwest::Error, settings: &FetchSettings) -> FetchErrorKind {
    let message = if error.is_timeout() {
        format!("request timed out after {}ms", settings.static_timeout_ms)
    } else if error.is_redirect() {
        format!("redirect limit of {} exceeded", settings.max_redirects)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };
    FetchErrorKind::Network { message }
}
