//! Output module for turning crawl results into documents
//!
//! This module handles:
//! - Assembling records into an aggregate or per-page [`Document`]
//! - Rendering documents as Markdown
//! - Writing the result to disk

mod document;
mod markdown;
mod writer;

pub use document::{
    assemble, assemble_report, slugify, AggregateMetadata, Document, PageDocument, PageMetadata,
    Section, TocEntry,
};
pub use markdown::{format_aggregate, format_block, format_page, TIMESTAMP_FORMAT};
pub use writer::{page_stem, url_stem, OutputWriter, WrittenOutput, DEFAULT_OUTPUT_DIR};

use std::path::PathBuf;
use thiserror::Error;

/// Output-specific errors
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid root URL for output naming: {0}")]
    Url(#[from] url::ParseError),

    #[error("Nothing to write: the document has no pages")]
    Empty,
}

/// Result type alias for output operations
pub type OutputResult<T> = std::result::Result<T, OutputError>;

/// Renders a document as Markdown
///
/// # Returns
///
/// One string for an aggregate document, one per page otherwise
pub fn render_markdown(document: &Document) -> Vec<String> {
    match document {
        Document::Aggregate {
            metadata,
            table_of_contents,
            sections,
            failures,
        } => vec![format_aggregate(metadata, table_of_contents, sections, failures)],
        Document::PerPage { pages } => pages.iter().map(format_page).collect(),
    }
}
