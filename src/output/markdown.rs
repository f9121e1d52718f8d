//! Markdown rendering
//!
//! This module renders assembled documents as Markdown with YAML-style
//! front-matter. The front-matter keys and section labels are a stable
//! format that downstream consumers parse.

use crate::crawler::ContentBlock;
use crate::output::document::{AggregateMetadata, PageDocument, Section, TocEntry};
use crate::FetchErrorKind;
use chrono::{DateTime, Utc};
use url::Url;

/// Timestamp format used in front-matter and headers
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Formats an aggregate document
///
/// # Arguments
///
/// * `metadata` - Front-matter values
/// * `table_of_contents` - Entries in section order
/// * `sections` - One per page
/// * `failures` - Pages listed in a trailing "Failed Pages" section
///
/// # Returns
///
/// A formatted markdown string
pub fn format_aggregate(
    metadata: &AggregateMetadata,
    table_of_contents: &[TocEntry],
    sections: &[Section],
    failures: &[(Url, FetchErrorKind)],
) -> String {
    let mut md = String::new();
    let scraped_at = timestamp(&metadata.scraped_at);

    // Front-matter
    md.push_str("---\n");
    md.push_str(&format!("source: {}\n", metadata.source));
    md.push_str(&format!("start_url: {}\n", metadata.start_url));
    md.push_str(&format!("scraped_at: {}\n", scraped_at));
    md.push_str(&format!("pages_crawled: {}\n", metadata.pages_crawled));
    md.push_str("---\n\n");

    md.push_str(&format!("# {}\n\n", metadata.source));
    md.push_str(&format!(
        "*Crawled on {} - {} pages*\n\n",
        scraped_at, metadata.pages_crawled
    ));
    md.push_str("---\n\n");

    md.push_str("## Table of Contents\n\n");
    for (i, entry) in table_of_contents.iter().enumerate() {
        md.push_str(&format!("{}. [{}](#{})\n", i + 1, entry.title, entry.anchor));
    }
    md.push('\n');

    for section in sections {
        md.push_str("---\n\n");
        md.push_str(&format!("<a id=\"{}\"></a>\n", section.anchor));
        md.push_str(&format!("## {}\n\n", section.title));
        md.push_str(&format!("**URL:** {}\n\n", section.url));
        push_blocks(&mut md, &section.blocks);
    }

    if !failures.is_empty() {
        md.push_str("---\n\n");
        md.push_str("## Failed Pages\n\n");
        for (url, error) in failures {
            md.push_str(&format!("- {}: {} ({})\n", url, error.label(), error));
        }
        md.push('\n');
    }

    md
}

/// Formats a single-page document
///
/// Documents carrying internal links get a "Content" heading and a trailing
/// "Internal Links" list.
pub fn format_page(page: &PageDocument) -> String {
    let mut md = String::new();
    let meta = &page.metadata;

    md.push_str("---\n");
    md.push_str(&format!("url: {}\n", meta.url));
    md.push_str(&format!("scraped_at: {}\n", timestamp(&meta.scraped_at)));
    md.push_str(&format!("title: {}\n", meta.title));
    md.push_str("---\n\n");

    md.push_str(&format!("# {}\n\n", meta.title));

    match &page.internal_links {
        Some(links) => {
            md.push_str("## Content\n\n");
            push_blocks(&mut md, &page.blocks);

            if !links.is_empty() {
                md.push_str("## Internal Links\n\n");
                for link in links {
                    md.push_str(&format!("- [{}]({})\n", link_label(link), link));
                }
                md.push('\n');
            }
        }
        None => push_blocks(&mut md, &page.blocks),
    }

    md
}

/// Renders one content block without trailing newline
pub fn format_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Heading { level, text } => {
            format!("{} {}", "#".repeat(usize::from((*level).clamp(1, 6))), text)
        }
        ContentBlock::Paragraph(text) => text.clone(),
        ContentBlock::ListItem(text) => format!("- {}", text),
        ContentBlock::Link { text, href } => format!("[{}]({})", text, href),
    }
}

/// Appends blocks separated by blank lines; consecutive list items stay together
fn push_blocks(md: &mut String, blocks: &[ContentBlock]) {
    let mut previous: Option<&ContentBlock> = None;

    for block in blocks {
        if let Some(prev) = previous {
            let both_items = matches!(prev, ContentBlock::ListItem(_))
                && matches!(block, ContentBlock::ListItem(_));
            if !both_items {
                md.push('\n');
            }
        }
        md.push_str(&format_block(block));
        md.push('\n');
        previous = Some(block);
    }

    if !blocks.is_empty() {
        md.push('\n');
    }
}

/// Visible text for a link in the "Internal Links" list
fn link_label(url: &Url) -> String {
    let mut label = url.path().to_string();
    if let Some(query) = url.query() {
        label.push('?');
        label.push_str(query);
    }
    label
}
