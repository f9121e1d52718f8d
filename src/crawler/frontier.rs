//! Breadth-first frontier
//!
//! The frontier owns all traversal state for one crawl. It is shared between
//! workers behind a mutex; each operation is one critical section, so the page
//! budget check and the in-flight accounting can never race.

use crate::config::CrawlConfig;
use std::collections::{HashMap, HashSet, VecDeque};
use url::Url;

/// Traversal state for one crawl
#[derive(Debug, Default)]
pub struct CrawlState {
    /// URLs whose processing has finished
    visited: HashSet<Url>,

    /// URLs waiting in the queue or currently in flight
    queued: HashSet<Url>,

    /// FIFO order of URLs not yet handed out
    order: VecDeque<Url>,

    depth_of: HashMap<Url, u32>,

    /// Pages handed out and finished, failures included
    pages_emitted: usize,

    /// Pages handed out and not yet finished
    in_flight: usize,
}

/// Decides which URL is processed next and which discovered links are kept
#[derive(Debug)]
pub struct Frontier {
    max_pages: usize,
    max_depth: Option<u32>,
    state: CrawlState,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new(max_pages: usize, max_depth: Option<u32>) -> Self {
        Self {
            max_pages,
            max_depth,
            state: CrawlState::default(),
        }
    }

    /// Creates an empty frontier bounded by a crawl configuration
    pub fn for_config(config: &CrawlConfig) -> Self {
        Self::new(config.max_pages, config.max_depth)
    }

    /// Queues the root URL at depth 0
    pub fn seed(&mut self, root: Url) {
        self.state.depth_of.insert(root.clone(), 0);
        self.state.queued.insert(root.clone());
        self.state.order.push_back(root);
    }

    /// Hands out the next URL and its depth in FIFO order
    ///
    /// Returns `None` when the queue is exhausted or when the pages already
    /// finished plus those in flight would reach `max_pages`.
    pub fn next(&mut self) -> Option<(Url, u32)> {
        if self.state.pages_emitted + self.state.in_flight >= self.max_pages {
            return None;
        }

        let url = self.state.order.pop_front()?;
        let depth = self.state.depth_of.get(&url).copied().unwrap_or(0);
        self.state.in_flight += 1;
        Some((url, depth))
    }

    /// Records that processing of a handed-out URL finished
    ///
    /// Called for failures too, so a failed page is never retried.
    pub fn mark_visited(&mut self, url: &Url) {
        self.state.queued.remove(url);
        if self.state.visited.insert(url.clone()) {
            self.state.in_flight = self.state.in_flight.saturating_sub(1);
            self.state.pages_emitted += 1;
        }
    }

    /// Releases the slot of a handed-out URL whose result was lost
    pub fn abandon(&mut self) {
        self.state.in_flight = self.state.in_flight.saturating_sub(1);
    }

    /// Queues links found on a page at `parent_depth`
    ///
    /// Links already visited or queued are skipped, as are all links when
    /// `parent_depth + 1` exceeds the depth limit.
    ///
    /// # Returns
    ///
    /// The number of newly queued links
    pub fn offer<I>(&mut self, links: I, parent_depth: u32) -> usize
    where
        I: IntoIterator<Item = Url>,
    {
        let depth = parent_depth + 1;
        if self.max_depth.is_some_and(|max| depth > max) {
            return 0;
        }

        let mut added = 0;
        for link in links {
            if self.state.visited.contains(&link) || self.state.queued.contains(&link) {
                continue;
            }
            self.state.depth_of.insert(link.clone(), depth);
            self.state.queued.insert(link.clone());
            self.state.order.push_back(link);
            added += 1;
        }
        added
    }

    /// Claims a redirect target as visited
    ///
    /// Returns `false` when the target is already known, in which case the
    /// page it belongs to is a duplicate.
    pub fn claim_alias(&mut self, url: &Url) -> bool {
        if self.state.visited.contains(url) || self.state.queued.contains(url) {
            return false;
        }
        self.state.visited.insert(url.clone());
        true
    }

    /// Depth a URL was queued at
    pub fn depth_of(&self, url: &Url) -> Option<u32> {
        self.state.depth_of.get(url).copied()
    }

    pub fn pages_emitted(&self) -> usize {
        self.state.pages_emitted
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight
    }

    /// URLs waiting to be handed out
    pub fn pending(&self) -> usize {
        self.state.order.len()
    }
}
