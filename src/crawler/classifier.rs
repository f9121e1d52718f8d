//! Render-need classification
//!
//! Decides from a static fetch whether the page only materializes after its
//! scripts run. The heuristics are approximate; server-rendered pages clear
//! them by a wide margin and empty application shells fall well short.

use super::extractor::{extract_blocks, visible_text};
use super::fetcher::FetchResult;
use crate::config::{CrawlConfig, RenderHeuristics};
use crate::FetchErrorKind;
use scraper::{Html, Selector};
use std::fmt;

/// Mount points of common client-side frameworks
const SPA_MOUNTS: &[&str] = &[
    "#app",
    "#root",
    "#__next",
    "#__nuxt",
    "[data-reactroot]",
    "[ng-app]",
];

/// Statuses that bot-protected sites return to non-browser clients
const BLOCKED_STATUSES: &[u16] = &[401, 403, 429];

/// Why a page should be re-fetched through the browser
#[derive(Debug, Clone, PartialEq)]
pub enum RenderReason {
    /// The configuration demands rendering
    Forced,

    /// The static request was refused in a way a browser may get past
    Blocked { status: u16 },

    /// Little text and many scripts
    ScriptHeavy { text_chars: usize, scripts: usize },

    /// Almost no text and a framework mount point
    SpaShell { text_chars: usize },

    /// A loading placeholder and no real structure
    LoadingPlaceholder { marker: String },

    /// A large document that is nearly all markup
    LowTextRatio { ratio: f64 },
}

impl fmt::Display for RenderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forced => write!(f, "browser forced"),
            Self::Blocked { status } => write!(f, "static request refused with HTTP {}", status),
            Self::ScriptHeavy { text_chars, scripts } => {
                write!(f, "{} text chars with {} scripts", text_chars, scripts)
            }
            Self::SpaShell { text_chars } => {
                write!(f, "{} text chars with an app mount point", text_chars)
            }
            Self::LoadingPlaceholder { marker } => write!(f, "loading placeholder \"{}\"", marker),
            Self::LowTextRatio { ratio } => write!(f, "text/markup ratio {:.4}", ratio),
        }
    }
}

/// Whether a static fetch should be re-done with a browser
///
/// # Arguments
///
/// * `result` - The static fetch result
/// * `config` - The crawl request (for `force_browser`)
/// * `heuristics` - Thresholds
pub fn needs_rendering(
    result: &FetchResult,
    config: &CrawlConfig,
    heuristics: &RenderHeuristics,
) -> bool {
    render_reason(result, config, heuristics).is_some()
}

/// Like [`needs_rendering`], naming the rule that fired
///
/// Rules are checked in order; the first match wins.
pub fn render_reason(
    result: &FetchResult,
    config: &CrawlConfig,
    heuristics: &RenderHeuristics,
) -> Option<RenderReason> {
    if config.force_browser {
        return Some(RenderReason::Forced);
    }

    match &result.error {
        Some(FetchErrorKind::Http { status }) if BLOCKED_STATUSES.contains(status) => {
            return Some(RenderReason::Blocked { status: *status });
        }
        Some(_) => return None,
        None => {}
    }

    let html = result.raw_html.as_deref()?;
    let document = Html::parse_document(html);

    let text = visible_text(&document);
    let text_chars = text.chars().count();
    let scripts = count(&document, "script");

    if text_chars < heuristics.min_text_chars && scripts > heuristics.script_threshold {
        return Some(RenderReason::ScriptHeavy { text_chars, scripts });
    }

    if text_chars < heuristics.spa_text_chars && SPA_MOUNTS.iter().any(|css| count(&document, css) > 0) {
        return Some(RenderReason::SpaShell { text_chars });
    }

    if text_chars < heuristics.min_text_chars {
        let lowered = text.to_lowercase();
        let marker = heuristics
            .loading_markers
            .iter()
            .find(|marker| lowered.contains(&marker.to_lowercase()));

        if let Some(marker) = marker {
            let structural = extract_blocks(&document, &result.url)
                .iter()
                .filter(|block| block.is_structural())
                .count();
            if structural < heuristics.min_blocks {
                return Some(RenderReason::LoadingPlaceholder {
                    marker: marker.clone(),
                });
            }
        }
    }

    if html.len() >= heuristics.ratio_floor_bytes {
        let ratio = text.len() as f64 / html.len() as f64;
        if ratio < heuristics.min_text_ratio {
            return Some(RenderReason::LowTextRatio { ratio });
        }
    }

    None
}

fn count(document: &Html, css: &str) -> usize {
    Selector::parse(css)
        .map(|selector| document.select(&selector).count())
        .unwrap_or(0)
}
