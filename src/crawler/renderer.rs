//! Headless browser rendering
//!
//! The [`PageRenderer`] trait is the seam between the crawler and whatever
//! executes client-side scripts. [`ChromeRenderer`] drives a shared headless
//! Chromium through the DevTools protocol; tests substitute their own
//! implementation.

use crate::config::FetchSettings;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Failures while rendering a page in the browser
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("rendering {url} timed out after {after_ms}ms")]
    Timeout { url: String, after_ms: u128 },

    #[error("failed to read rendered content: {0}")]
    Content(String),
}

/// The DOM of a page after its scripts have run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Where the browser ended up, if it navigated away from the request
    pub final_url: Option<Url>,

    /// Serialized document
    pub html: String,
}

/// Renders pages with script execution
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Loads `url`, lets its scripts settle, and returns the serialized DOM
    ///
    /// Must give up within `timeout`.
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError>;

    /// Releases browser resources
    async fn shutdown(&self) {}
}

/// A launched browser plus the task pumping its DevTools connection
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

/// Renderer backed by a single lazily launched headless Chromium
///
/// One browser process is shared by every render. Each render gets its own
/// browser context, so cookies, storage and cache never carry over between
/// pages; the context is disposed once the tab is closed.
pub struct ChromeRenderer {
    settings: FetchSettings,
    session: Mutex<Option<BrowserSession>>,
}

impl ChromeRenderer {
    /// Creates a renderer; the browser is launched on first use
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            settings: settings.clone(),
            session: Mutex::new(None),
        }
    }

    /// Opens a blank tab in a fresh browser context, launching the browser if needed
    async fn open_tab(&self) -> Result<(BrowserContextId, Page), RenderError> {
        let mut guard = self.session.lock().await;
        if guard.is_none() {
            *guard = Some(launch_browser(&self.settings).await?);
        }

        let Some(session) = guard.as_ref() else {
            return Err(RenderError::Launch("browser session unavailable".to_string()));
        };

        let context = session
            .browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(|e| RenderError::Launch(format!("failed to create browser context: {}", e)))?;

        let page = match session.browser.new_page(isolated_target(&context)?).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(e) = session.browser.dispose_browser_context(context).await {
                    debug!("Failed to dispose browser context: {}", e);
                }
                return Err(RenderError::Launch(format!("failed to open tab: {}", e)));
            }
        };

        Ok((context, page))
    }

    async fn dispose_context(&self, context: BrowserContextId) {
        let guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return;
        };
        if let Err(e) = session.browser.dispose_browser_context(context).await {
            debug!("Failed to dispose browser context: {}", e);
        }
    }

    async fn load(&self, page: &Page, url: &Url) -> Result<RenderedPage, RenderError> {
        let navigation = |e: chromiumoxide::error::CdpError| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };

        page.goto(url.as_str()).await.map_err(navigation)?;
        page.wait_for_navigation().await.map_err(navigation)?;

        // Late XHR-driven content
        tokio::time::sleep(self.settings.render_settle()).await;

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::Content(e.to_string()))?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok());

        Ok(RenderedPage { final_url, html })
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, RenderError> {
        let (context, page) = self.open_tab().await?;

        let outcome = tokio::time::timeout(timeout, self.load(&page, url)).await;

        if let Err(e) = page.close().await {
            debug!("Failed to close tab for {}: {}", url, e);
        }
        self.dispose_context(context).await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
                after_ms: timeout.as_millis(),
            }),
        }
    }

    async fn shutdown(&self) {
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };

        if let Err(e) = session.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = session.browser.wait().await {
            debug!("Browser process did not exit cleanly: {}", e);
        }
        session.handler.abort();

        if let Err(e) = std::fs::remove_dir_all(&session.profile_dir) {
            debug!("Failed to remove browser profile {}: {}", session.profile_dir.display(), e);
        }

        info!("Browser shut down");
    }
}

/// Launches headless Chromium and spawns its event loop
async fn launch_browser(settings: &FetchSettings) -> Result<BrowserSession, RenderError> {
    let profile_dir =
        std::env::temp_dir().join(format!("sitescribe-chrome-{}", std::process::id()));

    let mut builder = BrowserConfig::builder()
        .request_timeout(settings.render_timeout())
        .user_data_dir(&profile_dir)
        .no_sandbox()
        .arg(format!("--user-agent={}", settings.user_agent))
        .arg(format!("--lang={}", primary_language(&settings.accept_language)))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio")
        .arg("--hide-scrollbars");

    if let Some(path) = &settings.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let config = builder.build().map_err(RenderError::Launch)?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| RenderError::Launch(e.to_string()))?;

    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("Browser handler event error: {}", e);
            }
        }
    });

    info!("Launched headless browser");

    Ok(BrowserSession {
        browser,
        handler,
        profile_dir,
    })
}

/// Target parameters for a blank tab inside `context`
fn isolated_target(context: &BrowserContextId) -> Result<CreateTargetParams, RenderError> {
    CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(context.clone())
        .build()
        .map_err(RenderError::Launch)
}

/// First tag of an Accept-Language value (`en-US,en;q=0.9` -> `en-US`)
fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split([',', ';'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("en-US")
}
