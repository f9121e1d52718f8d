//! Content extraction from fetched HTML
//!
//! This module turns raw HTML into a [`PageRecord`]:
//! - A title (`<title>`, first `<h1>`, `og:title`, or the URL path)
//! - Content blocks in document order (headings, paragraphs, list items, links)
//! - Outgoing links restricted to the crawl's [`LinkScope`]
//!
//! Extraction is a pure function of its inputs.

use crate::url::{normalize, LinkScope};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Elements whose subtrees never contribute content
const DENYLIST: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
    "template", "form", "button", "select", "head",
];

/// Elements that never render visible text
const NON_VISUAL: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Inline elements whose text joins the surrounding run of text
const INLINE: &[&str] = &[
    "span", "strong", "em", "b", "i", "u", "s", "code", "kbd", "samp", "small", "mark", "abbr",
    "cite", "q", "sub", "sup", "time", "label", "var", "del", "ins", "font",
];

/// Elements that separate words when their text is flattened
const BREAKING: &[&str] = &[
    "p", "div", "li", "br", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "th", "dt", "dd",
    "section", "article", "pre", "blockquote",
];

/// Candidate content roots, most specific first
const CONTENT_ROOTS: &[&str] = &["main", "article", "#content", ".content", "body"];

/// One unit of page content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// `<h1>`..`<h6>`
    Heading { level: u8, text: String },

    /// A paragraph, blockquote, or loose run of text
    Paragraph(String),

    /// A list item (nested list items follow their parent)
    ListItem(String),

    /// A standalone anchor
    Link { text: String, href: String },
}

impl ContentBlock {
    /// Whether this block gives the page structure (heading or paragraph)
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Heading { .. } | Self::Paragraph(_))
    }
}

/// The normalized result of extracting one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// Absolute URL the content was served from
    pub url: Url,

    /// Page title, never empty
    pub title: String,

    /// Content in document order
    pub blocks: Vec<ContentBlock>,

    /// In-scope links, fragment-free, deduplicated, in document order
    pub outgoing_links: Vec<Url>,

    /// When the HTML was retrieved
    pub fetched_at: DateTime<Utc>,
}

/// Raised only when the payload is not markup at all
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("payload for {url} is not markup: {reason}")]
    NotMarkup { url: String, reason: String },
}

/// Extracts a page record from raw HTML
///
/// Empty or content-free HTML yields a valid record with no blocks.
///
/// # Arguments
///
/// * `raw_html` - The HTML to extract from
/// * `source_url` - The URL the HTML was served from; relative links resolve against it
/// * `scope` - Which outgoing links to keep
/// * `fetched_at` - Retrieval timestamp carried into the record
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use sitescribe::crawler::{extract, ContentBlock};
/// use sitescribe::url::LinkScope;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><p>Hello</p><a href="/next">Next</a></body></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let scope = LinkScope::new(&base, true, None);
/// let record = extract(html, &base, &scope, Utc::now()).unwrap();
/// assert_eq!(record.title, "Test");
/// assert_eq!(record.blocks[0], ContentBlock::Paragraph("Hello".to_string()));
/// assert_eq!(record.outgoing_links[0].as_str(), "https://example.com/next");
/// ```
pub fn extract(
    raw_html: &str,
    source_url: &Url,
    scope: &LinkScope,
    fetched_at: DateTime<Utc>,
) -> Result<PageRecord, ExtractionError> {
    if raw_html.contains('\0') {
        return Err(ExtractionError::NotMarkup {
            url: source_url.to_string(),
            reason: "contains NUL bytes".to_string(),
        });
    }

    let document = Html::parse_document(raw_html);

    Ok(PageRecord {
        url: source_url.clone(),
        title: extract_title(&document, source_url),
        blocks: extract_blocks(&document, source_url),
        outgoing_links: extract_links(&document, source_url, scope),
        fetched_at,
    })
}

/// Extracts the page title
///
/// Falls back through `<title>`, the first `<h1>`, `og:title`, and finally the
/// URL path (or host, for the root path).
fn extract_title(document: &Html, url: &Url) -> String {
    let from_selector = |css: &str| -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .next()
            .map(text_of)
            .filter(|s| !s.is_empty())
    };

    from_selector("title")
        .or_else(|| from_selector("h1"))
        .or_else(|| {
            let selector = Selector::parse("meta[property='og:title']").ok()?;
            document
                .select(&selector)
                .next()
                .and_then(|meta| meta.value().attr("content"))
                .map(collapse_whitespace)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| fallback_title(url))
}

fn fallback_title(url: &Url) -> String {
    match url.path() {
        "" | "/" => url.host_str().unwrap_or("/").to_string(),
        path => path.to_string(),
    }
}

/// Extracts content blocks from the main content region in document order
pub fn extract_blocks(document: &Html, base_url: &Url) -> Vec<ContentBlock> {
    let mut walker = BlockWalker {
        base_url,
        blocks: Vec::new(),
        pending: String::new(),
    };

    walker.walk(content_root(document));
    walker.flush();
    walker.blocks
}

fn content_root(document: &Html) -> ElementRef<'_> {
    CONTENT_ROOTS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element())
}

/// Walks an element tree, emitting blocks and buffering loose inline text
struct BlockWalker<'a> {
    base_url: &'a Url,
    blocks: Vec<ContentBlock>,
    pending: String,
}

impl BlockWalker<'_> {
    fn walk(&mut self, element: ElementRef) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.pending.push_str(text),
                Node::Element(value) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = value.name();

                    if DENYLIST.contains(&name) {
                        continue;
                    }

                    match name {
                        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                            self.flush();
                            let level = name[1..].parse().unwrap_or(1);
                            self.push_text_block(text_of(child_el), |text| {
                                ContentBlock::Heading { level, text }
                            });
                        }
                        "p" | "blockquote" | "pre" => {
                            self.flush();
                            self.push_text_block(text_of(child_el), ContentBlock::Paragraph);
                        }
                        "li" | "dt" | "dd" => {
                            self.flush();
                            let mut text = String::new();
                            collect_text(child_el, &mut text, DENYLIST, true);
                            self.push_text_block(collapse_whitespace(&text), ContentBlock::ListItem);
                            self.walk_nested_lists(child_el);
                        }
                        "a" => self.anchor(child_el),
                        "br" => self.pending.push(' '),
                        _ if INLINE.contains(&name) => self.walk(child_el),
                        _ => {
                            self.flush();
                            self.walk(child_el);
                            self.flush();
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Walks lists nested anywhere under a list item
    fn walk_nested_lists(&mut self, element: ElementRef) {
        for child in element.children().filter_map(ElementRef::wrap) {
            let name = child.value().name();
            if DENYLIST.contains(&name) {
                continue;
            }
            if name == "ul" || name == "ol" {
                self.walk(child);
            } else {
                self.walk_nested_lists(child);
            }
        }
    }

    /// Anchors inside running text stay in that text; standalone ones become links
    fn anchor(&mut self, element: ElementRef) {
        let text = text_of(element);

        if !self.pending.trim().is_empty() {
            self.pending.push_str(&text);
            return;
        }

        match element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, self.base_url))
        {
            Some(href) if !text.is_empty() => {
                self.flush();
                self.blocks.push(ContentBlock::Link {
                    text,
                    href: href.to_string(),
                });
            }
            _ => self.pending.push_str(&text),
        }
    }

    fn push_text_block(&mut self, text: String, make: impl FnOnce(String) -> ContentBlock) {
        if !text.is_empty() {
            self.blocks.push(make(text));
        }
    }

    fn flush(&mut self) {
        let text = collapse_whitespace(&self.pending);
        self.pending.clear();
        self.push_text_block(text, ContentBlock::Paragraph);
    }
}

/// Extracts in-scope outgoing links from the whole document
///
/// Navigation regions count here even though their text is not content.
fn extract_links(document: &Html, base_url: &Url, scope: &LinkScope) -> Vec<Url> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(resolved) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        let Ok(link) = normalize(resolved) else {
            continue;
        };

        if scope.admits(&link) && seen.insert(link.as_str().to_string()) {
            links.push(link);
        }
    }

    links
}

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - Fragment-only links (same page anchors)
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

/// Visible body text with whitespace collapsed
pub fn visible_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    collect_text(body, &mut text, NON_VISUAL, false);
    collapse_whitespace(&text)
}

/// Flattened, whitespace-collapsed text of an element, skipping denylisted subtrees
fn text_of(element: ElementRef) -> String {
    let mut text = String::new();
    collect_text(element, &mut text, DENYLIST, false);
    collapse_whitespace(&text)
}

fn collect_text(element: ElementRef, out: &mut String, skip: &[&str], skip_lists: bool) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(value) => {
                let name = value.name();
                if skip.contains(&name) || (skip_lists && (name == "ul" || name == "ol")) {
                    continue;
                }
                let breaking = BREAKING.contains(&name);
                if breaking {
                    out.push(' ');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out, skip, skip_lists);
                }
                if breaking {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
