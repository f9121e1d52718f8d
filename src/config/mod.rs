//! Configuration module for Sitescribe
//!
//! Two layers of configuration exist:
//!
//! - [`CrawlConfig`]: the immutable per-run request (root URL, depth, page cap,
//!   output mode), populated by the CLI.
//! - [`Settings`]: tuning knobs (timeouts, concurrency, render heuristics),
//!   optionally loaded from a TOML file. Every key has a default.
//!
//! # Example
//!
//! ```no_run
//! use sitescribe::config::load_settings;
//! use std::path::Path;
//!
//! let settings = load_settings(Path::new("sitescribe.toml")).unwrap();
//! println!("Workers: {}", settings.concurrency.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ConcurrencySettings, CrawlConfig, FetchSettings, RenderHeuristics, Settings};

// Re-export parser functions
pub use parser::{compute_config_hash, load_settings, load_settings_with_hash, parse_settings};
pub use validation::{validate_crawl_config, validate_settings};
