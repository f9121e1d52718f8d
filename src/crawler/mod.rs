//! Crawler module for page acquisition and traversal
//!
//! This module contains the core crawling logic, including:
//! - Static and browser-rendered fetching
//! - Deciding when a page needs rendering
//! - Content and link extraction
//! - Breadth-first frontier management
//! - Overall crawl coordination

mod classifier;
mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod renderer;

pub use classifier::{needs_rendering, render_reason, RenderReason};
pub use coordinator::{run, Coordinator, CrawlReport};
pub use extractor::{extract, extract_blocks, ContentBlock, ExtractionError, PageRecord};
pub use fetcher::{build_http_client, is_html_content_type, FetchResult, FetchStrategy, Fetcher};
pub use frontier::{CrawlState, Frontier};
pub use renderer::{ChromeRenderer, PageRenderer, RenderError, RenderedPage};
