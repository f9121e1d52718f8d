//! Sitescribe main entry point
//!
//! This is the command-line interface for turning web pages into
//! Markdown context documents.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use sitescribe::config::{load_settings_with_hash, validate_crawl_config, CrawlConfig, Settings};
use sitescribe::crawler::{Coordinator, CrawlReport};
use sitescribe::output::{assemble_report, OutputWriter, WrittenOutput, DEFAULT_OUTPUT_DIR};
use sitescribe::ScribeError;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Exit code after an interrupt (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

/// Sitescribe: web pages as language-model context
///
/// Fetches a page (or crawls a site) and writes clean Markdown with
/// front-matter and a table of contents. Pages that only render with
/// JavaScript are detected and loaded in headless Chromium.
#[derive(Parser, Debug)]
#[command(name = "sitescribe")]
#[command(version = "1.0.0")]
#[command(about = "Web pages as language-model context", long_about = None)]
struct Cli {
    /// Page to fetch; `https://` is assumed when no scheme is given
    #[arg(value_name = "URL")]
    url: String,

    /// Output file (single page or aggregate crawl)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Directory for generated file names
    #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Follow same-site links
    #[arg(short, long)]
    crawl: bool,

    /// Maximum pages to crawl
    #[arg(short, long, value_name = "N", default_value_t = 50)]
    max: usize,

    /// Maximum link depth (unbounded when omitted)
    #[arg(short, long, value_name = "N")]
    depth: Option<u32>,

    /// Write one file per page into a directory
    #[arg(short, long, requires = "crawl")]
    separate: bool,

    /// Only follow links whose path starts with this prefix (e.g. /docs/)
    #[arg(short, long, value_name = "PATH")]
    prefix: Option<String>,

    /// Always render with the headless browser
    #[arg(short = 'b', long)]
    force_browser: bool,

    /// Path to TOML settings file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Validate settings and show what would be fetched without fetching
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn crawl_config(&self) -> CrawlConfig {
        let root_url = with_scheme(&self.url);
        let mut config = if self.crawl {
            CrawlConfig::crawl(root_url, self.max, self.depth)
        } else {
            CrawlConfig::single_page(root_url)
        };
        config.force_browser = self.force_browser;
        config.separate_output = self.separate;
        config.path_prefix = self.prefix.clone();
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitescribe=info,warn"),
            1 => EnvFilter::new("sitescribe=debug,info"),
            2 => EnvFilter::new("sitescribe=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => {
            tracing::info!("Loading settings from: {}", path.display());
            let (settings, hash) = load_settings_with_hash(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?;
            tracing::info!("Settings loaded successfully (hash: {})", hash);
            settings
        }
        None => Settings::default(),
    };

    let config = cli.crawl_config();

    if cli.dry_run {
        validate_crawl_config(&config)?;
        print_dry_run(&config, &settings);
        return Ok(ExitCode::SUCCESS);
    }

    let coordinator = Coordinator::new(config.clone(), settings)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping crawl");
            let _ = cancel_tx.send(true);
        }
    });

    let report = match coordinator.run_until(cancel_rx).await {
        Ok(report) => report,
        Err(ScribeError::RootUnreachable { url, reason }) => {
            eprintln!("Could not load {} ({}: {})", url, reason.label(), reason);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    print_failures(&report);

    if report.records.is_empty() {
        if !report.cancelled {
            eprintln!("No pages found");
        }
        return Ok(ExitCode::from(exit_status(&report)));
    }

    let document = assemble_report(&report, &config);
    let written = OutputWriter::new(&cli.output_dir)
        .with_output_path(cli.output.clone())
        .write(&document, &config, Utc::now())?;

    match &written {
        WrittenOutput::File(path) => println!("Saved: {}", path.display()),
        WrittenOutput::Directory { path, files } => {
            println!("Saved: {}/", path.display());
            println!("{} files created", files);
        }
    }
    println!(
        "{} pages written, {} failed",
        report.records.len(),
        report.failures.len()
    );

    Ok(ExitCode::from(exit_status(&report)))
}

/// Process exit status for a finished or interrupted crawl
fn exit_status(report: &CrawlReport) -> u8 {
    if report.cancelled {
        EXIT_INTERRUPTED
    } else if report.records.is_empty() {
        1
    } else {
        0
    }
}

/// Prepends `https://` to bare hosts
fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

fn print_failures(report: &CrawlReport) {
    if report.failures.is_empty() {
        return;
    }

    println!("\nFailed pages ({}):", report.failures.len());
    for (url, error) in &report.failures {
        println!("  - {} [{}] {}", url, error.label(), error);
    }
    println!();
}

/// Handles the --dry-run mode: shows the effective configuration
fn print_dry_run(config: &CrawlConfig, settings: &Settings) {
    println!("=== Sitescribe Dry Run ===\n");

    println!("Request:");
    println!("  URL: {}", config.root_url);
    println!("  Follow links: {}", config.follow_links);
    if config.follow_links {
        println!("  Max pages: {}", config.max_pages);
        match config.max_depth {
            Some(depth) => println!("  Max depth: {}", depth),
            None => println!("  Max depth: unbounded"),
        }
        if let Some(prefix) = &config.path_prefix {
            println!("  Path prefix: {}", prefix);
        }
        println!("  Separate files: {}", config.separate_output);
    }
    println!("  Force browser: {}", config.force_browser);

    println!("\nFetching:");
    println!("  Static timeout: {}ms", settings.fetch.static_timeout_ms);
    println!("  Render timeout: {}ms", settings.fetch.render_timeout_ms);
    println!("  Render settle: {}ms", settings.fetch.render_settle_ms);
    println!("  Max redirects: {}", settings.fetch.max_redirects);
    println!(
        "  Workers: {} (render pool {})",
        settings.concurrency.workers, settings.concurrency.render_pool
    );

    println!("\n✓ Configuration is valid");
}
