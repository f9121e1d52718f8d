//! Output persistence
//!
//! Writes an assembled [`Document`] to disk: one Markdown file for a single
//! page or an aggregate crawl, or a directory with one file per page.

use super::document::Document;
use super::markdown::{format_aggregate, format_page};
use super::{OutputError, OutputResult};
use crate::config::CrawlConfig;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Default directory for output files
pub const DEFAULT_OUTPUT_DIR: &str = "scraper_results";

const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Where the output ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrittenOutput {
    File(PathBuf),
    Directory { path: PathBuf, files: usize },
}

impl WrittenOutput {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) => path,
            Self::Directory { path, .. } => path,
        }
    }
}

/// Persists documents under an output directory
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
    output_path: Option<PathBuf>,
}

impl Default for OutputWriter {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl OutputWriter {
    /// Creates a writer that names files itself inside `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_path: None,
        }
    }

    /// Uses an explicit file path for single-file output
    ///
    /// Ignored for per-page output of a crawl, which always gets a directory.
    pub fn with_output_path(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    /// Writes `document`
    ///
    /// # Arguments
    ///
    /// * `document` - The assembled document
    /// * `config` - The crawl request; its root URL names the output
    /// * `now` - Timestamp used in generated names
    ///
    /// # Returns
    ///
    /// * `Ok(WrittenOutput)` - Path of the file or directory written
    /// * `Err(OutputError)` - Failed to create directories or write files
    pub fn write(
        &self,
        document: &Document,
        config: &CrawlConfig,
        now: DateTime<Utc>,
    ) -> OutputResult<WrittenOutput> {
        let root = Url::parse(&config.root_url)?;
        let stamp = now.format(FILE_TIMESTAMP_FORMAT).to_string();

        match document {
            Document::Aggregate {
                metadata,
                table_of_contents,
                sections,
                failures,
            } => {
                let markdown = format_aggregate(metadata, table_of_contents, sections, failures);
                let path = self.file_path(&root, Some("crawl"), &stamp);
                write_file(&path, &markdown)?;
                Ok(WrittenOutput::File(path))
            }

            Document::PerPage { pages } if !config.follow_links => {
                let page = pages.first().ok_or(OutputError::Empty)?;
                let path = self.file_path(&root, None, &stamp);
                write_file(&path, &format_page(page))?;
                Ok(WrittenOutput::File(path))
            }

            Document::PerPage { pages } => {
                if pages.is_empty() {
                    return Err(OutputError::Empty);
                }

                let dir = self.output_dir.join(format!("{}_{}", host_stem(&root), stamp));
                fs::create_dir_all(&dir).map_err(|source| OutputError::Write {
                    path: dir.clone(),
                    source,
                })?;

                let mut names = HashSet::new();
                for page in pages {
                    let name = unique_name(&mut names, &page_stem(&page.metadata.url));
                    write_file(&dir.join(format!("{}.md", name)), &format_page(page))?;
                }

                info!("Wrote {} page files to {}", pages.len(), dir.display());
                Ok(WrittenOutput::Directory {
                    path: dir,
                    files: pages.len(),
                })
            }
        }
    }

    fn file_path(&self, root: &Url, suffix: Option<&str>, stamp: &str) -> PathBuf {
        if let Some(path) = &self.output_path {
            return path.clone();
        }

        let stem = url_stem(root);
        let name = match suffix {
            Some(suffix) => format!("{}_{}_{}.md", stem, suffix, stamp),
            None => format!("{}_{}.md", stem, stamp),
        };
        self.output_dir.join(name)
    }
}

fn write_file(path: &Path, content: &str) -> OutputResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, content).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Replaces non-word characters with `_`, collapses runs, and trims them
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

fn netloc(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// File stem from host and path (`example.com/docs/api` -> `example_com_docs_api`)
pub fn url_stem(url: &Url) -> String {
    match sanitize(&format!("{}{}", netloc(url), url.path())) {
        stem if stem.is_empty() => "page".to_string(),
        stem => stem,
    }
}

/// Directory stem for per-page output (`example.com` -> `example_com`)
fn host_stem(url: &Url) -> String {
    match sanitize(&netloc(url)) {
        stem if stem.is_empty() => "site".to_string(),
        stem => stem,
    }
}

/// File stem for one page in per-page output; the root path is `index`
pub fn page_stem(url: &Url) -> String {
    match sanitize(url.path().trim_matches('/')) {
        stem if stem.is_empty() => "index".to_string(),
        stem => stem,
    }
}

fn unique_name(taken: &mut HashSet<String>, stem: &str) -> String {
    let mut candidate = stem.to_string();
    let mut n = 2;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{}-{}", stem, n);
        n += 1;
    }
    candidate
}
