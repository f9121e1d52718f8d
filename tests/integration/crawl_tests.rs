//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and a stub renderer
//! in place of the headless browser, and exercise the full crawl cycle
//! end-to-end.

use async_trait::async_trait;
use sitescribe::config::{CrawlConfig, Settings};
use sitescribe::crawler::{
    ContentBlock, Coordinator, CrawlReport, PageRenderer, RenderError, RenderedPage,
};
use sitescribe::{FetchErrorKind, ScribeError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renderer serving canned HTML per URL
#[derive(Default)]
struct StubRenderer {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StubRenderer {
    fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for StubRenderer {
    async fn render(&self, url: &Url, _timeout: Duration) -> Result<RenderedPage, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url.as_str()) {
            Some(html) => Ok(RenderedPage {
                final_url: None,
                html: html.clone(),
            }),
            None => Err(RenderError::Navigation {
                url: url.to_string(),
                message: "no canned page".to_string(),
            }),
        }
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.fetch.static_timeout_ms = 1000;
    settings.fetch.render_timeout_ms = 2000;
    settings.fetch.render_settle_ms = 0;
    settings
}

/// A server-rendered page with the given title and links
fn html_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<li><a href=\"{}\">{}</a></li>", href, href))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body>\
         <h1>{title}</h1><p>Content of {title}.</p><ul>{anchors}</ul>\
         </body></html>"
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

async fn crawl_with(
    config: CrawlConfig,
    renderer: Arc<dyn PageRenderer>,
) -> Result<CrawlReport, ScribeError> {
    Coordinator::with_renderer(config, test_settings(), renderer)
        .expect("Failed to create coordinator")
        .run()
        .await
}

fn paths(report: &CrawlReport) -> Vec<String> {
    report
        .records
        .iter()
        .map(|record| record.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn test_single_static_page() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", html_page("Home", &[])).await;

    let config = CrawlConfig::single_page(mock_server.uri());
    let renderer = Arc::new(StubRenderer::default());
    let report = crawl_with(config, renderer.clone()).await.unwrap();

    assert_eq!(report.records.len(), 1);
    assert!(report.failures.is_empty());
    assert_eq!(report.pages_emitted, 1);
    assert_eq!(renderer.calls(), 0);

    let record = &report.records[0];
    assert_eq!(record.title, "Home");
    assert!(record
        .blocks
        .contains(&ContentBlock::Paragraph("Content of Home.".to_string())));
}

#[tokio::test]
async fn test_depth_one_crawl_emits_root_and_children() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", &["/a", "/b", "/c"])).await;
    mount_page(&mock_server, "/a", html_page("A", &["/a/deep"])).await;
    mount_page(&mock_server, "/b", html_page("B", &["/b/deep"])).await;
    mount_page(&mock_server, "/c", html_page("C", &[])).await;

    Mock::given(method("GET"))
        .and(path("/a/deep"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("Deep", &[])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = CrawlConfig::crawl(mock_server.uri(), 50, Some(1));
    let report = crawl_with(config, Arc::new(StubRenderer::default())).await.unwrap();

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.pages_emitted, 4);
    assert_eq!(paths(&report), vec!["/", "/a", "/b", "/c"]);
}

#[tokio::test]
async fn test_root_not_found_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = CrawlConfig::crawl(mock_server.uri(), 10, None);
    let renderer = Arc::new(StubRenderer::default());
    let result = crawl_with(config, renderer.clone()).await;

    match result {
        Err(ScribeError::RootUnreachable { reason, .. }) => {
            assert_eq!(reason, FetchErrorKind::Http { status: 404 });
        }
        other => panic!("expected RootUnreachable, got {:?}", other.map(|r| r.records.len())),
    }
    assert_eq!(renderer.calls(), 0);
}

#[tokio::test]
async fn test_timed_out_page_is_reported_and_crawl_continues() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", &["/slow", "/fast"])).await;
    mount_page(&mock_server, "/fast", html_page("Fast", &[])).await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Slow", &[]), "text/html")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let config = CrawlConfig::crawl(mock_server.uri(), 10, None);
    let report = crawl_with(config, Arc::new(StubRenderer::default())).await.unwrap();

    assert_eq!(paths(&report), vec!["/", "/fast"]);
    assert_eq!(report.failures.len(), 1);

    let (url, error) = &report.failures[0];
    assert_eq!(url.path(), "/slow");
    assert_eq!(error.label(), "NetworkError");
    assert_eq!(report.pages_emitted, 3);
}

#[tokio::test]
async fn test_client_rendered_page_uses_rendered_content() {
    let mock_server = MockServer::start().await;
    let root = format!("{}/", mock_server.uri());

    let shell = "<html><head><title>App</title></head><body>\
                 <div id=\"root\"></div><script src=\"/bundle.js\"></script>\
                 </body></html>";
    mount_page(&mock_server, "/", shell.to_string()).await;

    let rendered = "<html><head><title>App</title></head><body><div id=\"root\">\
                    <h1>Dashboard</h1><p>Rendered content from the browser.</p>\
                    </div></body></html>";
    let renderer = Arc::new(StubRenderer::default().with_page(&root, rendered));

    let config = CrawlConfig::single_page(mock_server.uri());
    let report = crawl_with(config, renderer.clone()).await.unwrap();

    assert_eq!(renderer.calls(), 1);
    assert_eq!(report.records.len(), 1);
    assert!(report.records[0]
        .blocks
        .contains(&ContentBlock::Paragraph("Rendered content from the browser.".to_string())));
}

#[tokio::test]
async fn test_failed_render_keeps_static_content() {
    let mock_server = MockServer::start().await;

    let shell = "<html><head><title>App</title></head><body>\
                 <div id=\"app\"><p>Static teaser</p></div>\
                 </body></html>";
    mount_page(&mock_server, "/", shell.to_string()).await;

    let renderer = Arc::new(StubRenderer::default());
    let config = CrawlConfig::single_page(mock_server.uri());
    let report = crawl_with(config, renderer.clone()).await.unwrap();

    assert_eq!(renderer.calls(), 1);
    assert_eq!(
        report.records[0].blocks,
        vec![ContentBlock::Paragraph("Static teaser".to_string())]
    );
}

#[tokio::test]
async fn test_force_browser_skips_static_fetch() {
    let mock_server = MockServer::start().await;
    let root = format!("{}/", mock_server.uri());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page("Static", &[])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let renderer = Arc::new(StubRenderer::default().with_page(&root, &html_page("Rendered", &[])));
    let mut config = CrawlConfig::single_page(mock_server.uri());
    config.force_browser = true;

    let report = crawl_with(config, renderer.clone()).await.unwrap();

    assert_eq!(renderer.calls(), 1);
    assert_eq!(report.records[0].title, "Rendered");
}

#[tokio::test]
async fn test_max_pages_one_emits_only_root() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", &["/a", "/b"])).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = CrawlConfig::crawl(mock_server.uri(), 1, None);
    let report = crawl_with(config, Arc::new(StubRenderer::default())).await.unwrap();

    assert_eq!(paths(&report), vec!["/"]);
    assert_eq!(report.pages_emitted, 1);
}

#[tokio::test]
async fn test_max_pages_caps_large_sites() {
    let mock_server = MockServer::start().await;

    let links: Vec<String> = (0..20).map(|i| format!("/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    mount_page(&mock_server, "/", html_page("Home", &link_refs)).await;
    for link in &links {
        mount_page(&mock_server, link, html_page(link, &link_refs)).await;
    }

    let config = CrawlConfig::crawl(mock_server.uri(), 7, None);
    let report = crawl_with(config, Arc::new(StubRenderer::default())).await.unwrap();

    assert_eq!(report.pages_emitted, 7);
    assert_eq!(report.records.len(), 7);
    assert_eq!(paths(&report)[..3], ["/", "/p0", "/p1"]);
}

#[tokio::test]
async fn test_pages_linked_twice_are_emitted_once() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", &["/a", "/b", "/shared"])).await;
    mount_page(&mock_server, "/a", html_page("A", &["/shared", "/"])).await;
    mount_page(&mock_server, "/b", html_page("B", &["/shared/", "/a#top"])).await;
    mount_page(&mock_server, "/shared", html_page("Shared", &[])).await;

    let config = CrawlConfig::crawl(mock_server.uri(), 50, None);
    let report = crawl_with(config, Arc::new(StubRenderer::default())).await.unwrap();

    let mut emitted = paths(&report);
    assert_eq!(emitted.len(), 4);
    emitted.sort();
    emitted.dedup();
    assert_eq!(emitted.len(), 4);
}

#[tokio::test]
async fn test_redirect_to_known_page_is_not_duplicated() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", &["/old", "/new"])).await;
    mount_page(&mock_server, "/new", html_page("New", &[])).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;

    let config = CrawlConfig::crawl(mock_server.uri(), 50, None);
    let report = crawl_with(config, Arc::new(StubRenderer::default())).await.unwrap();

    let new_pages = report
        .records
        .iter()
        .filter(|record| record.url.path() == "/new")
        .count();
    assert_eq!(new_pages, 1);
    assert_eq!(report.records.len(), 2);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_redirect_to_other_spelling_of_queued_page_is_not_duplicated() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", &["/old", "/new"])).await;
    mount_page(&mock_server, "/new", html_page("New", &[])).await;
    mount_page(&mock_server, "/new/", html_page("New", &[])).await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/"))
        .mount(&mock_server)
        .await;

    let config = CrawlConfig::crawl(mock_server.uri(), 50, None);
    let report = crawl_with(config, Arc::new(StubRenderer::default())).await.unwrap();

    assert_eq!(paths(&report), vec!["/", "/new"]);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn test_non_html_and_http_errors_are_failures() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", &["/data", "/missing", "/ok"])).await;
    mount_page(&mock_server, "/ok", html_page("Ok", &[])).await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"a\": 1}")
                .insert_header("content-type", "application/json"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let renderer = Arc::new(StubRenderer::default());
    let config = CrawlConfig::crawl(mock_server.uri(), 50, None);
    let report = crawl_with(config, renderer.clone()).await.unwrap();

    assert_eq!(paths(&report), vec!["/", "/ok"]);

    let failures: HashMap<String, FetchErrorKind> = report
        .failures
        .iter()
        .map(|(url, error)| (url.path().to_string(), error.clone()))
        .collect();
    assert!(matches!(
        failures.get("/data"),
        Some(FetchErrorKind::UnsupportedContentType { .. })
    ));
    assert_eq!(failures.get("/missing"), Some(&FetchErrorKind::Http { status: 404 }));
    assert_eq!(renderer.calls(), 0);
}

#[tokio::test]
async fn test_external_and_out_of_prefix_links_are_not_followed() {
    let mock_server = MockServer::start().await;

    // Trailing slashes are normalized away, so the root is requested as /docs
    mount_page(
        &mock_server,
        "/docs",
        html_page("Docs", &["/docs/intro", "/blog/post", "https://other.example/page"]),
    )
    .await;
    mount_page(&mock_server, "/docs/intro", html_page("Intro", &[])).await;
    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = CrawlConfig::crawl(format!("{}/docs/", mock_server.uri()), 50, None);
    config.path_prefix = Some("/docs".to_string());
    let report = crawl_with(config, Arc::new(StubRenderer::default())).await.unwrap();

    assert_eq!(paths(&report), vec!["/docs", "/docs/intro"]);
}

#[tokio::test]
async fn test_cancellation_returns_partial_report() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", html_page("Home", &["/slow"])).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html_page("Slow", &[]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut settings = test_settings();
    settings.fetch.static_timeout_ms = 10_000;
    settings.fetch.render_timeout_ms = 10_000;

    let config = CrawlConfig::crawl(mock_server.uri(), 10, None);
    let coordinator =
        Coordinator::with_renderer(config, settings, Arc::new(StubRenderer::default())).unwrap();

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = cancel_tx.send(true);
    });

    let report = coordinator.run_until(cancel_rx).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(paths(&report), vec!["/"]);
}

#[tokio::test]
async fn test_cancellation_during_root_fetch_returns_promptly() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Home", &[]), "text/html")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let mut settings = test_settings();
    settings.fetch.static_timeout_ms = 10_000;

    let config = CrawlConfig::single_page(mock_server.uri());
    let coordinator =
        Coordinator::with_renderer(config, settings, Arc::new(StubRenderer::default())).unwrap();

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = cancel_tx.send(true);
    });

    let started = std::time::Instant::now();
    let report = coordinator.run_until(cancel_rx).await.unwrap();

    assert!(report.cancelled);
    assert!(report.records.is_empty());
    assert_eq!(report.pages_emitted, 0);
    assert!(started.elapsed() < Duration::from_secs(3));
}
