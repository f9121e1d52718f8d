use crate::config::types::{ConcurrencySettings, CrawlConfig, FetchSettings, RenderHeuristics, Settings};
use crate::ConfigError;
use url::Url;

/// Upper bound on concurrent fetches
const MAX_WORKERS: usize = 8;

/// Validates a crawl request
pub fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.root_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid root URL '{}': {}", config.root_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Root URL '{}' must use http or https",
            config.root_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Root URL '{}' has no host",
            config.root_url
        )));
    }

    if config.max_pages == 0 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if let Some(prefix) = &config.path_prefix {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "path prefix must start with '/', got '{}'",
                prefix
            )));
        }
    }

    Ok(())
}

/// Validates the settings file contents
pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    validate_fetch_settings(&settings.fetch)?;
    validate_concurrency_settings(&settings.concurrency)?;
    validate_render_heuristics(&settings.render)?;
    Ok(())
}

fn validate_fetch_settings(fetch: &FetchSettings) -> Result<(), ConfigError> {
    if fetch.static_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "static-timeout-ms must be >= 100ms, got {}ms",
            fetch.static_timeout_ms
        )));
    }

    if fetch.render_timeout_ms < fetch.static_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "render-timeout-ms ({}) must not be shorter than static-timeout-ms ({})",
            fetch.render_timeout_ms, fetch.static_timeout_ms
        )));
    }

    if fetch.max_redirects > 10 {
        return Err(ConfigError::Validation(format!(
            "max-redirects must be <= 10, got {}",
            fetch.max_redirects
        )));
    }

    if fetch.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_concurrency_settings(concurrency: &ConcurrencySettings) -> Result<(), ConfigError> {
    if concurrency.workers < 1 || concurrency.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, concurrency.workers
        )));
    }

    if concurrency.render_pool < 1 {
        return Err(ConfigError::Validation(format!(
            "render-pool must be >= 1, got {}",
            concurrency.render_pool
        )));
    }

    // Browser pages are the scarce resource
    if concurrency.workers > 1 && concurrency.render_pool >= concurrency.workers {
        return Err(ConfigError::Validation(format!(
            "render-pool ({}) must be smaller than workers ({})",
            concurrency.render_pool, concurrency.workers
        )));
    }

    Ok(())
}

fn validate_render_heuristics(render: &RenderHeuristics) -> Result<(), ConfigError> {
    if render.spa_text_chars > render.min_text_chars {
        return Err(ConfigError::Validation(format!(
            "spa-text-chars ({}) must not exceed min-text-chars ({})",
            render.spa_text_chars, render.min_text_chars
        )));
    }

    if !(0.0..=1.0).contains(&render.min_text_ratio) {
        return Err(ConfigError::Validation(format!(
            "min-text-ratio must be between 0 and 1, got {}",
            render.min_text_ratio
        )));
    }

    Ok(())
}
