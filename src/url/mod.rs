//! URL handling module for Sitescribe
//!
//! This module provides URL normalization for deduplication, site
//! comparison, and the link scope that decides which discovered links
//! a crawl may follow.

mod domain;
mod normalize;

use crate::config::CrawlConfig;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, same_site, site_key};
pub use normalize::{normalize, normalize_url};

/// Path extensions of resources that are never worth following
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".mp3", ".mp4", ".avi",
    ".mov", ".webm", ".zip", ".rar", ".gz", ".tar", ".7z", ".exe", ".dmg", ".doc", ".docx",
    ".xls", ".xlsx", ".ppt", ".pptx", ".css", ".js", ".json", ".xml",
];

/// Which discovered links a crawl may follow
///
/// Built from the root page's final URL (after redirects), so a root that
/// redirects to another host scopes the crawl to the host actually served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkScope {
    root_site: Option<String>,
    same_domain_only: bool,
    path_prefix: Option<String>,
}

impl LinkScope {
    /// Creates a scope rooted at `root`
    pub fn new(root: &Url, same_domain_only: bool, path_prefix: Option<String>) -> Self {
        Self {
            root_site: site_key(root),
            same_domain_only,
            path_prefix,
        }
    }

    /// Creates the scope a crawl configuration asks for
    pub fn for_config(root: &Url, config: &CrawlConfig) -> Self {
        Self::new(root, config.same_domain_only, config.path_prefix.clone())
    }

    /// Scope that admits any http(s) page link
    pub fn unrestricted() -> Self {
        Self {
            root_site: None,
            same_domain_only: false,
            path_prefix: None,
        }
    }

    /// Whether `url` may be followed
    ///
    /// # Rules
    ///
    /// - Only `http` and `https`
    /// - Never binary/document resources (by path extension)
    /// - Same site as the root when `same_domain_only` is set
    /// - Path starts with the prefix when one is set
    pub fn admits(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let path = url.path().to_ascii_lowercase();
        if SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return false;
        }

        if self.same_domain_only {
            match (&self.root_site, site_key(url)) {
                (Some(root), Some(candidate)) if *root == candidate => {}
                _ => return false,
            }
        }

        if let Some(prefix) = &self.path_prefix {
            if !url.path().starts_with(prefix.as_str()) {
                return false;
            }
        }

        true
    }
}
