use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome user agent; many sites serve stripped pages to unknown clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// The immutable request for one crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    /// Page the crawl starts from
    pub root_url: String,

    /// Follow links at all; `false` is the single-page mode
    pub follow_links: bool,

    /// Only follow links on the root page's site
    pub same_domain_only: bool,

    /// Maximum link-following depth (root is depth 0); `None` is unbounded
    pub max_depth: Option<u32>,

    /// Hard cap on pages taken from the frontier, failures included
    pub max_pages: usize,

    /// Skip the render-need heuristic and always render
    pub force_browser: bool,

    /// Emit one document per page instead of one aggregate document
    pub separate_output: bool,

    /// Only follow links whose path starts with this prefix
    pub path_prefix: Option<String>,
}

impl CrawlConfig {
    /// Configuration for fetching exactly one page
    pub fn single_page(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            follow_links: false,
            same_domain_only: true,
            max_depth: Some(0),
            max_pages: 1,
            force_browser: false,
            separate_output: false,
            path_prefix: None,
        }
    }

    /// Configuration for a recursive crawl
    pub fn crawl(root_url: impl Into<String>, max_pages: usize, max_depth: Option<u32>) -> Self {
        Self {
            root_url: root_url.into(),
            follow_links: true,
            same_domain_only: true,
            max_depth,
            max_pages,
            force_browser: false,
            separate_output: false,
            path_prefix: None,
        }
    }
}

/// Tuning knobs loaded from an optional TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub fetch: FetchSettings,

    #[serde(default)]
    pub concurrency: ConcurrencySettings,

    #[serde(default)]
    pub render: RenderHeuristics,
}

/// Fetcher timeouts and request identity
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Timeout for a static fetch, redirects included (milliseconds)
    #[serde(rename = "static-timeout-ms")]
    pub static_timeout_ms: u64,

    /// Navigation timeout for a rendered fetch (milliseconds)
    #[serde(rename = "render-timeout-ms")]
    pub render_timeout_ms: u64,

    /// Extra wait after navigation for scripts to settle (milliseconds)
    #[serde(rename = "render-settle-ms")]
    pub render_settle_ms: u64,

    /// Maximum redirect hops for a static fetch
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// User-Agent header for static fetches and the browser
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Accept-Language header for static fetches
    #[serde(rename = "accept-language")]
    pub accept_language: String,

    /// Chrome/Chromium binary; auto-detected when absent
    #[serde(rename = "chrome-executable")]
    pub chrome_executable: Option<PathBuf>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            static_timeout_ms: 10_000,
            render_timeout_ms: 30_000,
            render_settle_ms: 2_000,
            max_redirects: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            chrome_executable: None,
        }
    }
}

impl FetchSettings {
    pub fn static_timeout(&self) -> Duration {
        Duration::from_millis(self.static_timeout_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }
}

/// Bounds on in-flight work
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    /// Maximum concurrent page fetches
    pub workers: usize,

    /// Maximum concurrent browser pages
    #[serde(rename = "render-pool")]
    pub render_pool: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            workers: 4,
            render_pool: 2,
        }
    }
}

/// Thresholds for deciding that a static fetch needs a browser pass
///
/// These are approximate. They were tuned against typical server-rendered
/// pages (which comfortably exceed them) and empty SPA shells (which do not).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderHeuristics {
    /// Visible text below this is suspicious
    #[serde(rename = "min-text-chars")]
    pub min_text_chars: usize,

    /// More `<script>` tags than this on a near-empty page means client rendering
    #[serde(rename = "script-threshold")]
    pub script_threshold: usize,

    /// Visible text below this plus an SPA mount point means client rendering
    #[serde(rename = "spa-text-chars")]
    pub spa_text_chars: usize,

    /// Fewer heading/paragraph blocks than this counts as no structure
    #[serde(rename = "min-blocks")]
    pub min_blocks: usize,

    /// Placeholder phrases shown while a client app boots (matched lowercase)
    #[serde(rename = "loading-markers")]
    pub loading_markers: Vec<String>,

    /// Documents at least this large are checked for text/markup ratio
    #[serde(rename = "ratio-floor-bytes")]
    pub ratio_floor_bytes: usize,

    /// Text/markup ratio below this means the markup carries no content
    #[serde(rename = "min-text-ratio")]
    pub min_text_ratio: f64,
}

impl Default for RenderHeuristics {
    fn default() -> Self {
        Self {
            min_text_chars: 500,
            script_threshold: 5,
            spa_text_chars: 200,
            min_blocks: 2,
            loading_markers: vec![
                "loading".to_string(),
                "enable javascript".to_string(),
                "please wait".to_string(),
            ],
            ratio_floor_bytes: 16 * 1024,
            min_text_ratio: 0.005,
        }
    }
}
