//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Fetching the root page on its own (its failure is fatal)
//! - Handing frontier URLs to a bounded set of workers
//! - Static fetch, render-need classification, and rendered re-fetch
//! - Feeding discovered links back to the frontier
//! - Collecting records and failures into a [`CrawlReport`]

use super::classifier::render_reason;
use super::extractor::{extract, PageRecord};
use super::fetcher::{FetchResult, FetchStrategy, Fetcher};
use super::frontier::Frontier;
use super::renderer::{ChromeRenderer, PageRenderer};
use crate::config::{validate_crawl_config, validate_settings, CrawlConfig, Settings};
use crate::url::{normalize, normalize_url, LinkScope};
use crate::{FetchErrorKind, ScribeError};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// Everything a crawl produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Successful pages in breadth-first order
    pub records: Vec<PageRecord>,

    /// Pages that could not be turned into records, in breadth-first order
    pub failures: Vec<(Url, FetchErrorKind)>,

    /// Pages taken from the frontier, failures included
    pub pages_emitted: usize,

    /// Root URL after redirects
    pub root_url: Url,

    pub started_at: DateTime<Utc>,

    /// Whether the run was cut short by cancellation
    pub cancelled: bool,
}

/// Outcome of one page, tagged with the order it left the frontier
struct PageOutcome {
    seq: usize,
    url: Url,
    depth: u32,
    result: Result<PageRecord, FetchErrorKind>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<CrawlConfig>,
    settings: Arc<Settings>,
    fetcher: Arc<Fetcher>,
    frontier: Arc<Mutex<Frontier>>,
}

impl Coordinator {
    /// Creates a coordinator that renders with headless Chromium
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl request
    /// * `settings` - Timeouts, concurrency bounds, and heuristics
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ScribeError)` - Invalid configuration or HTTP client failure
    pub fn new(config: CrawlConfig, settings: Settings) -> Result<Self, ScribeError> {
        let renderer = Arc::new(ChromeRenderer::new(&settings.fetch));
        Self::with_renderer(config, settings, renderer)
    }

    /// Creates a coordinator with a caller-supplied renderer
    pub fn with_renderer(
        config: CrawlConfig,
        settings: Settings,
        renderer: Arc<dyn PageRenderer>,
    ) -> Result<Self, ScribeError> {
        validate_crawl_config(&config)?;
        validate_settings(&settings)?;

        let fetcher = Fetcher::new(&settings, renderer)?;
        let frontier = Frontier::for_config(&config);

        Ok(Self {
            config: Arc::new(config),
            settings: Arc::new(settings),
            fetcher: Arc::new(fetcher),
            frontier: Arc::new(Mutex::new(frontier)),
        })
    }

    /// Runs the crawl to completion
    pub async fn run(self) -> Result<CrawlReport, ScribeError> {
        let (_never, cancel) = watch::channel(false);
        self.run_until(cancel).await
    }

    /// Runs the crawl until it completes or `cancel` turns `true`
    ///
    /// On cancellation, in-flight pages are abandoned and the records
    /// collected so far are returned.
    pub async fn run_until(self, cancel: watch::Receiver<bool>) -> Result<CrawlReport, ScribeError> {
        let result = self.crawl(cancel).await;
        self.fetcher.shutdown().await;
        result
    }

    async fn crawl(&self, mut cancel: watch::Receiver<bool>) -> Result<CrawlReport, ScribeError> {
        let started_at = Utc::now();
        let root = normalize_url(&self.config.root_url)?;

        info!("Starting crawl at {}", root);

        self.frontier().seed(root.clone());
        let (root, root_depth) = self
            .frontier()
            .next()
            .ok_or_else(|| ScribeError::RootUnreachable {
                url: self.config.root_url.clone(),
                reason: FetchErrorKind::Network {
                    message: "root was not queued".to_string(),
                },
            })?;

        let fetched = tokio::select! {
            fetched = acquire(&self.fetcher, &self.config, &self.settings, &root) => fetched,
            _ = cancelled(&mut cancel) => {
                info!("Crawl cancelled while fetching root");
                return Ok(CrawlReport {
                    records: Vec::new(),
                    failures: Vec::new(),
                    pages_emitted: 0,
                    root_url: root,
                    started_at,
                    cancelled: true,
                });
            }
        };
        self.frontier().mark_visited(&root);

        if let Some(reason) = fetched.error.clone() {
            return Err(ScribeError::RootUnreachable {
                url: root.to_string(),
                reason,
            });
        }

        let root_url = frontier_key(&fetched.url);
        if root_url != root {
            info!("Root redirected to {}", root_url);
            self.frontier().claim_alias(&root_url);
        }

        let scope = Arc::new(LinkScope::for_config(&root_url, &self.config));
        let root_record = into_record(fetched, &scope).map_err(|reason| ScribeError::RootUnreachable {
            url: root.to_string(),
            reason,
        })?;

        if self.config.follow_links {
            let queued = self
                .frontier()
                .offer(root_record.outgoing_links.iter().cloned(), root_depth);
            debug!("Queued {} links from root", queued);
        }

        let mut outcomes = vec![PageOutcome {
            seq: 0,
            url: root.clone(),
            depth: root_depth,
            result: Ok(root_record),
        }];

        let workers = self.settings.concurrency.workers;
        let mut tasks = JoinSet::new();
        let mut next_seq = 1;
        let mut was_cancelled = false;

        loop {
            while tasks.len() < workers {
                let Some((url, depth)) = self.frontier().next() else {
                    break;
                };

                let seq = next_seq;
                next_seq += 1;

                let fetcher = Arc::clone(&self.fetcher);
                let config = Arc::clone(&self.config);
                let settings = Arc::clone(&self.settings);
                let scope = Arc::clone(&scope);

                tasks.spawn(async move {
                    let fetched = acquire(&fetcher, &config, &settings, &url).await;
                    let result = into_record(fetched, &scope);
                    PageOutcome {
                        seq,
                        url,
                        depth,
                        result,
                    }
                });
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(outcome)) => {
                        if let Some(outcome) = self.settle(outcome) {
                            outcomes.push(outcome);
                        }
                        self.log_progress(outcomes.len());
                    }
                    Some(Err(e)) => {
                        warn!("Page task failed: {}", e);
                        self.frontier().abandon();
                    }
                    None => break,
                },
                _ = cancelled(&mut cancel) => {
                    info!("Crawl cancelled, abandoning {} in-flight pages", tasks.len());
                    tasks.abort_all();
                    was_cancelled = true;
                    break;
                }
            }
        }

        outcomes.sort_by_key(|outcome| outcome.seq);

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(record) => records.push(record),
                Err(error) => failures.push((outcome.url, error)),
            }
        }

        let pages_emitted = self.frontier().pages_emitted();

        info!(
            "Crawl completed: {} pages emitted, {} records, {} failures in {}s",
            pages_emitted,
            records.len(),
            failures.len(),
            (Utc::now() - started_at).num_seconds()
        );

        Ok(CrawlReport {
            records,
            failures,
            pages_emitted,
            root_url,
            started_at,
            cancelled: was_cancelled,
        })
    }

    /// Applies a finished page to the frontier
    ///
    /// Returns `None` when the page turned out to be a duplicate reached
    /// through a redirect.
    fn settle(&self, outcome: PageOutcome) -> Option<PageOutcome> {
        let mut frontier = self.frontier();
        frontier.mark_visited(&outcome.url);

        match &outcome.result {
            Ok(record) => {
                if record.url != outcome.url && !frontier.claim_alias(&record.url) {
                    debug!("{} redirected to already known {}", outcome.url, record.url);
                    return None;
                }

                if self.config.follow_links {
                    frontier.offer(record.outgoing_links.iter().cloned(), outcome.depth);
                }
            }
            Err(error) => {
                warn!("Failed {} ({}): {}", outcome.url, error.label(), error);
            }
        }

        Some(outcome)
    }

    fn log_progress(&self, finished: usize) {
        if finished % 10 == 0 {
            let frontier = self.frontier();
            info!(
                "Progress: {} pages finished, {} in frontier, {} in flight",
                finished,
                frontier.pending(),
                frontier.in_flight()
            );
        }
    }

    fn frontier(&self) -> MutexGuard<'_, Frontier> {
        self.frontier
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fetches a page, re-fetching through the browser when it looks client-rendered
async fn acquire(
    fetcher: &Fetcher,
    config: &CrawlConfig,
    settings: &Settings,
    url: &Url,
) -> FetchResult {
    if config.force_browser {
        return fetcher.fetch(url, FetchStrategy::Rendered).await;
    }

    let fetched = fetcher.fetch(url, FetchStrategy::Static).await;

    let Some(reason) = render_reason(&fetched, config, &settings.render) else {
        return fetched;
    };

    info!("Rendering {} ({})", url, reason);
    let rendered = fetcher.fetch(url, FetchStrategy::Rendered).await;

    match (&rendered.error, fetched.is_success()) {
        (Some(error), true) => {
            warn!("Render failed for {}, keeping static content: {}", url, error);
            fetched
        }
        _ => rendered,
    }
}

/// Resolves once `cancel` holds `true`; never resolves if the sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// The frontier's spelling of a fetched URL
fn frontier_key(url: &Url) -> Url {
    normalize(url.clone()).unwrap_or_else(|_| url.clone())
}

/// Turns a fetch result into a record
///
/// Links resolve against the URL as served; the record itself carries the
/// frontier key so redirect targets compare with queued URLs.
fn into_record(fetched: FetchResult, scope: &LinkScope) -> Result<PageRecord, FetchErrorKind> {
    if let Some(error) = fetched.error {
        return Err(error);
    }

    let html = fetched.raw_html.unwrap_or_default();
    let mut record =
        extract(&html, &fetched.url, scope, Utc::now()).map_err(|e| FetchErrorKind::Extraction {
            message: e.to_string(),
        })?;
    record.url = frontier_key(&fetched.url);
    Ok(record)
}

/// Runs a crawl to completion with the headless Chromium renderer
///
/// # Arguments
///
/// * `config` - The crawl request
/// * `settings` - Timeouts, concurrency bounds, and heuristics
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Records and failures; partial failures are not errors
/// * `Err(ScribeError)` - Invalid configuration or unreachable root
pub async fn run(config: CrawlConfig, settings: Settings) -> Result<CrawlReport, ScribeError> {
    Coordinator::new(config, settings)?.run().await
}
