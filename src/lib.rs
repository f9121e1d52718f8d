//! Sitescribe: web pages as language-model context
//!
//! This crate fetches a starting page and, optionally, follows same-site links
//! breadth-first up to a bounded depth and page count. Each page is fetched
//! statically first and re-fetched through a headless browser when the static
//! result looks client-rendered. The extracted pages are assembled into a
//! Markdown document with front-matter and a table of contents.

pub mod config;
pub mod crawler;
pub mod output;
pub mod url;

use thiserror::Error;

/// Main error type for Sitescribe operations
#[derive(Debug, Error)]
pub enum ScribeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Root URL {url} is unreachable: {reason}")]
    RootUnreachable { url: String, reason: FetchErrorKind },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
}

/// Why a single page could not be turned into a record
///
/// These never abort a crawl; they are attached to the failing URL and
/// reported next to the successful records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    #[error("extraction failed: {message}")]
    Extraction { message: String },

    #[error("render failed: {message}")]
    Render { message: String },
}

impl FetchErrorKind {
    /// Short label used in logs and failure listings
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network { .. } => "NetworkError",
            Self::Http { .. } => "HTTPError",
            Self::UnsupportedContentType { .. } => "UnsupportedContentType",
            Self::Extraction { .. } => "ExtractionError",
            Self::Render { .. } => "RenderError",
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Sitescribe operations
pub type Result<T> = std::result::Result<T, ScribeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{CrawlConfig, Settings};
pub use crawler::{run, ContentBlock, CrawlReport, PageRecord};
pub use output::{assemble, Document};
pub use url::{normalize_url, LinkScope};
