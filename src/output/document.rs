//! Document assembly
//!
//! Turns crawl records into a [`Document`]: one aggregate document with a
//! table of contents, or one document per page.

use crate::config::CrawlConfig;
use crate::crawler::{ContentBlock, CrawlReport, PageRecord};
use crate::url::extract_domain;
use crate::FetchErrorKind;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use url::Url;

/// Front-matter of an aggregate document
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMetadata {
    /// Host of the start URL
    pub source: String,

    /// The start URL as requested
    pub start_url: String,

    pub scraped_at: DateTime<Utc>,

    /// Number of sections
    pub pages_crawled: usize,
}

/// One table of contents line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub anchor: String,
}

/// One page inside an aggregate document
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub anchor: String,
    pub title: String,
    pub url: Url,
    pub blocks: Vec<ContentBlock>,
}

/// Front-matter of a single-page document
#[derive(Debug, Clone, PartialEq)]
pub struct PageMetadata {
    pub url: Url,
    pub scraped_at: DateTime<Utc>,
    pub title: String,
}

/// A self-contained document for one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageDocument {
    pub metadata: PageMetadata,
    pub blocks: Vec<ContentBlock>,

    /// Present only for a lone single-page fetch, which lists its links
    pub internal_links: Option<Vec<Url>>,
}

/// Final output of a crawl
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// All pages in one document with a shared table of contents
    Aggregate {
        metadata: AggregateMetadata,
        table_of_contents: Vec<TocEntry>,
        sections: Vec<Section>,
        failures: Vec<(Url, FetchErrorKind)>,
    },

    /// One document per page, in crawl order
    PerPage { pages: Vec<PageDocument> },
}

/// Assembles records into a document
///
/// # Arguments
///
/// * `records` - Pages in emission order
/// * `config` - Decides the mode: single page, aggregate, or per page
///
/// # Returns
///
/// The assembled document; the aggregate timestamp is the earliest fetch time
pub fn assemble(records: &[PageRecord], config: &CrawlConfig) -> Document {
    let scraped_at = records
        .iter()
        .map(|record| record.fetched_at)
        .min()
        .unwrap_or_else(Utc::now);
    build(records, &[], config, scraped_at)
}

/// Assembles a crawl report, carrying its failures into aggregate output
pub fn assemble_report(report: &CrawlReport, config: &CrawlConfig) -> Document {
    build(&report.records, &report.failures, config, report.started_at)
}

fn build(
    records: &[PageRecord],
    failures: &[(Url, FetchErrorKind)],
    config: &CrawlConfig,
    scraped_at: DateTime<Utc>,
) -> Document {
    if !config.follow_links {
        let pages = records
            .iter()
            .take(1)
            .map(|record| page_document(record, true))
            .collect();
        return Document::PerPage { pages };
    }

    if config.separate_output {
        let pages = records
            .iter()
            .map(|record| page_document(record, false))
            .collect();
        return Document::PerPage { pages };
    }

    let mut slugs = SlugSet::default();
    let sections: Vec<Section> = records
        .iter()
        .map(|record| Section {
            anchor: slugs.claim(&record.title),
            title: record.title.clone(),
            url: record.url.clone(),
            blocks: record.blocks.clone(),
        })
        .collect();

    let table_of_contents = sections
        .iter()
        .map(|section| TocEntry {
            title: section.title.clone(),
            anchor: section.anchor.clone(),
        })
        .collect();

    Document::Aggregate {
        metadata: AggregateMetadata {
            source: source_domain(&config.root_url),
            start_url: config.root_url.clone(),
            scraped_at,
            pages_crawled: sections.len(),
        },
        table_of_contents,
        sections,
        failures: failures.to_vec(),
    }
}

fn page_document(record: &PageRecord, with_links: bool) -> PageDocument {
    PageDocument {
        metadata: PageMetadata {
            url: record.url.clone(),
            scraped_at: record.fetched_at,
            title: record.title.clone(),
        },
        blocks: record.blocks.clone(),
        internal_links: with_links.then(|| record.outgoing_links.clone()),
    }
}

/// Host of the start URL, with its port when one is given explicitly
fn source_domain(root_url: &str) -> String {
    let Some(url) = Url::parse(root_url).ok() else {
        return root_url.to_string();
    };
    match (extract_domain(&url), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host,
        (None, _) => root_url.to_string(),
    }
}

/// Anchor slug for a title
///
/// Lowercases, drops everything but word characters, whitespace, and hyphens,
/// then joins words with hyphens.
pub fn slugify(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Hands out unique slugs, suffixing repeats with `-1`, `-2`, ...
#[derive(Debug, Default)]
struct SlugSet {
    taken: HashSet<String>,
}

impl SlugSet {
    fn claim(&mut self, title: &str) -> String {
        let base = match slugify(title) {
            slug if slug.is_empty() => "page".to_string(),
            slug => slug,
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while !self.taken.insert(candidate.clone()) {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        candidate
    }
}
