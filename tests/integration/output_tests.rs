//! Integration tests for document output
//!
//! Crawl a mock site, assemble the report, and check the written Markdown.

use async_trait::async_trait;
use chrono::Utc;
use sitescribe::config::{CrawlConfig, Settings};
use sitescribe::crawler::{Coordinator, CrawlReport, PageRenderer, RenderError, RenderedPage};
use sitescribe::output::{assemble_report, render_markdown, OutputWriter, WrittenOutput};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NoBrowser;

#[async_trait]
impl PageRenderer for NoBrowser {
    async fn render(&self, url: &Url, _timeout: Duration) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Launch(format!("no browser in tests ({})", url)))
    }
}

async fn mount(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|href| format!("<p><a href=\"{}\">Go to {}</a></p>", href, href))
        .collect();
    let body = format!(
        "<html><head><title>{title}</title></head><body><main><h2>{title}</h2><p>About {title}.</p>{anchors}</main></body></html>"
    );

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn crawl(config: &CrawlConfig) -> CrawlReport {
    let mut settings = Settings::default();
    settings.fetch.static_timeout_ms = 2000;

    Coordinator::with_renderer(config.clone(), settings, Arc::new(NoBrowser))
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Crawl failed")
}

#[tokio::test]
async fn test_single_page_document() {
    let mock_server = MockServer::start().await;
    mount(&mock_server, "/", "Welcome", &["/about"]).await;

    let config = CrawlConfig::single_page(mock_server.uri());
    let report = crawl(&config).await;
    let document = assemble_report(&report, &config);

    let rendered = render_markdown(&document);
    assert_eq!(rendered.len(), 1);

    let md = &rendered[0];
    assert!(md.starts_with(&format!("---\nurl: {}/\nscraped_at: ", mock_server.uri())));
    assert!(md.contains("\ntitle: Welcome\n---\n\n# Welcome\n\n## Content\n\n"));
    assert!(md.contains("## Welcome\n\nAbout Welcome.\n"));
    assert!(md.contains(&format!(
        "## Internal Links\n\n- [/about]({}/about)\n",
        mock_server.uri()
    )));
}

#[tokio::test]
async fn test_aggregate_document_toc_matches_sections() {
    let mock_server = MockServer::start().await;
    mount(&mock_server, "/", "Home", &["/guide", "/faq"]).await;
    mount(&mock_server, "/guide", "Guide", &["/guide/setup"]).await;
    mount(&mock_server, "/faq", "Guide", &[]).await;
    mount(&mock_server, "/guide/setup", "Setup", &[]).await;

    let config = CrawlConfig::crawl(mock_server.uri(), 50, Some(2));
    let report = crawl(&config).await;
    assert_eq!(report.records.len(), 4);

    let temp = TempDir::new().unwrap();
    let document = assemble_report(&report, &config);
    let written = OutputWriter::new(temp.path())
        .write(&document, &config, Utc::now())
        .unwrap();

    let WrittenOutput::File(file) = written else {
        panic!("expected a single file");
    };
    let name = file.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("127_0_0_1_"));
    assert!(name.contains("_crawl_"));

    let md = fs::read_to_string(&file).unwrap();
    assert!(md.contains("\npages_crawled: 4\n"));
    assert!(md.contains(&format!("\nstart_url: {}\n", mock_server.uri())));
    assert!(md.contains("## Table of Contents\n\n1. [Home](#home)\n2. [Guide](#guide)\n3. [Guide](#guide-1)\n4. [Setup](#setup)\n"));

    for anchor in ["home", "guide", "guide-1", "setup"] {
        assert!(md.contains(&format!("<a id=\"{}\"></a>", anchor)));
    }
    assert_eq!(md.matches("**URL:** ").count(), 4);
    assert!(!md.contains("## Failed Pages"));
}

#[tokio::test]
async fn test_failures_are_listed_in_aggregate_output() {
    let mock_server = MockServer::start().await;
    mount(&mock_server, "/", "Home", &["/gone"]).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let config = CrawlConfig::crawl(mock_server.uri(), 50, None);
    let report = crawl(&config).await;
    let document = assemble_report(&report, &config);
    let md = &render_markdown(&document)[0];

    assert!(md.contains(&format!(
        "## Failed Pages\n\n- {}/gone: HTTPError (HTTP 410)\n",
        mock_server.uri()
    )));
}

#[tokio::test]
async fn test_separate_output_writes_one_file_per_page() {
    let mock_server = MockServer::start().await;
    mount(&mock_server, "/", "Home", &["/docs/intro"]).await;
    mount(&mock_server, "/docs/intro", "Intro", &[]).await;

    let mut config = CrawlConfig::crawl(mock_server.uri(), 50, None);
    config.separate_output = true;
    let report = crawl(&config).await;

    let temp = TempDir::new().unwrap();
    let document = assemble_report(&report, &config);
    let written = OutputWriter::new(temp.path())
        .write(&document, &config, Utc::now())
        .unwrap();

    let WrittenOutput::Directory { path, files } = written else {
        panic!("expected a directory");
    };
    assert_eq!(files, 2);

    let index = fs::read_to_string(path.join("index.md")).unwrap();
    assert!(index.contains("\ntitle: Home\n"));

    let intro = fs::read_to_string(path.join("docs_intro.md")).unwrap();
    assert!(intro.contains("\ntitle: Intro\n"));
    assert!(!intro.contains("Table of Contents"));
}
