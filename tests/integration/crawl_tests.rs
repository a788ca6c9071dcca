//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the engine
//! end-to-end against a SQLite frontier and a SQLite pages database.

use async_trait::async_trait;
use spider::config::{parse_config, Config};
use spider::crawler::{Engine, Fetch, FetchResult, Fetched, HttpFetcher};
use spider::frontier::{FrontierStore, SqliteFrontier};
use spider::sink::SqlitePageSink;
use spider::state::HostStatus;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sends every request over plain HTTP
///
/// Normalized URLs always use https, while the mock server only speaks http.
struct PlainHttp(HttpFetcher);

#[async_trait]
impl Fetch for PlainHttp {
    async fn get(&self, url: &str, max_retries: u32, delay: Duration) -> FetchResult<Fetched> {
        let url = match url.strip_prefix("https://") {
            Some(rest) => format!("http://{}", rest),
            None => url.to_string(),
        };
        self.0.get(&url, max_retries, delay).await
    }
}

fn fetcher() -> Arc<dyn Fetch> {
    Arc::new(PlainHttp(
        HttpFetcher::new("spider-test/1.0", Duration::from_secs(5)).unwrap(),
    ))
}

/// Creates a test configuration crawling without delays until idle
fn create_test_config(seeds: &[String], max_pages: u32) -> Config {
    let seeds: Vec<String> = seeds.iter().map(|s| format!("\"{}\"", s)).collect();
    parse_config(&format!(
        r#"
seeds = [{}]

[crawler]
max-workers = 4
max-pages = {}
max-retries = 1
crawl-delay = 0
robots-retries = 1
idle-backoff-ms = 20
exit-when-idle = true
"#,
        seeds.join(", "),
        max_pages
    ))
    .unwrap()
}

fn html_page(title: &str, links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="{}">link</a>"#, l))
        .collect();
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, anchors
        ))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(title, links))
        .mount(server)
        .await;
}

/// Counts GET requests per path received by the mock server
async fn requests_by_path(server: &MockServer) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for request in server.received_requests().await.unwrap_or_default() {
        *counts.entry(request.url.path().to_string()).or_insert(0) += 1;
    }
    counts
}

fn open_stores(dir: &Path) -> (Arc<SqliteFrontier>, Arc<SqlitePageSink>) {
    let frontier = SqliteFrontier::open(&dir.join("frontier.db")).unwrap();
    let pages = SqlitePageSink::open(&dir.join("pages.db")).unwrap();
    (Arc::new(frontier), Arc::new(pages))
}

#[tokio::test]
async fn test_full_crawl_single_host() {
    let server = MockServer::start().await;
    let base = server.uri();
    let host = server.address().to_string();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nDisallow: /private/\nSitemap: {}/sitemap.xml\n",
            base
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{}/from-sitemap/</loc></url>
</urlset>"#,
            base
        )))
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/",
        "Home",
        &["/page1/", "/page2/", "/private/secret/", "/login", "/report.pdf"],
    )
    .await;
    mount_page(&server, "/page1/", "Page 1", &["/", "/page2/"]).await;
    mount_page(&server, "/page2/", "Page 2", &[]).await;
    mount_page(&server, "/from-sitemap/", "From sitemap", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let (frontier, pages) = open_stores(dir.path());
    let config = create_test_config(&[format!("{}/", base)], 10);

    let engine = Engine::from_config(&config, frontier.clone(), fetcher());
    assert_eq!(engine.seed(&config.seeds).await.unwrap(), 1);

    let (_tx, rx) = watch::channel(false);
    let summary = engine.run(pages.clone(), rx).await.unwrap();

    assert_eq!(summary.hosts_claimed, 1);
    assert_eq!(summary.hosts_completed, 1);
    assert_eq!(summary.pages, 4);
    assert_eq!(summary.pages_persisted, 4);
    assert_eq!(pages.count().await.unwrap(), 4);

    let requests = requests_by_path(&server).await;
    assert_eq!(requests.get("/"), Some(&1));
    assert_eq!(requests.get("/page1/"), Some(&1));
    assert_eq!(requests.get("/page2/"), Some(&1));
    assert_eq!(requests.get("/from-sitemap/"), Some(&1));
    assert_eq!(requests.get("/private/secret/"), None);
    assert_eq!(requests.get("/login"), None);
    assert_eq!(requests.get("/report.pdf"), None);

    assert_eq!(
        frontier.host_status(&host).await.unwrap(),
        HostStatus::Completed
    );
    let policy = frontier.get_host_policy(&host).await.unwrap().unwrap();
    assert_eq!(policy.disallowed_prefixes, vec!["/private/".to_string()]);
    assert_eq!(policy.pages_crawled, 4);
}

#[tokio::test]
async fn test_max_pages_limits_host() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", "Home", &["/a/", "/b/", "/c/", "/d/"]).await;
    for route in ["/a/", "/b/", "/c/", "/d/"] {
        mount_page(&server, route, route, &[]).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let (frontier, pages) = open_stores(dir.path());
    let config = create_test_config(&[format!("{}/", base)], 2);

    let engine = Engine::from_config(&config, frontier.clone(), fetcher());
    engine.seed(&config.seeds).await.unwrap();

    let (_tx, rx) = watch::channel(false);
    let summary = engine.run(pages.clone(), rx).await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(pages.count().await.unwrap(), 2);

    let requests = requests_by_path(&server).await;
    let page_fetches: usize = requests
        .iter()
        .filter(|(p, _)| p.as_str() != "/robots.txt")
        .map(|(_, n)| *n)
        .sum();
    assert_eq!(page_fetches, 2);

    // The rest of the host's queue was discarded with the release
    assert_eq!(frontier.stats().await.unwrap().queued_urls, 0);
}

#[tokio::test]
async fn test_unreachable_robots_abandons_host() {
    let server = MockServer::start().await;
    let base = server.uri();
    let host = server.address().to_string();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_page(&server, "/", "Home", &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let (frontier, pages) = open_stores(dir.path());
    let config = create_test_config(&[format!("{}/", base)], 10);

    let engine = Engine::from_config(&config, frontier.clone(), fetcher());
    engine.seed(&config.seeds).await.unwrap();

    let (_tx, rx) = watch::channel(false);
    let summary = engine.run(pages.clone(), rx).await.unwrap();

    assert_eq!(summary.hosts_abandoned, 1);
    assert_eq!(summary.pages, 0);
    assert_eq!(
        frontier.host_status(&host).await.unwrap(),
        HostStatus::Abandoned
    );
    assert_eq!(requests_by_path(&server).await.get("/"), None);
}

#[tokio::test]
async fn test_two_engines_share_frontier() {
    let servers = [
        MockServer::start().await,
        MockServer::start().await,
        MockServer::start().await,
    ];
    for server in &servers {
        mount_page(server, "/", "Home", &["/one/", "/two/"]).await;
        mount_page(server, "/one/", "One", &["/", "/two/"]).await;
        mount_page(server, "/two/", "Two", &["/one/"]).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let pages = Arc::new(SqlitePageSink::open(&dir.path().join("pages.db")).unwrap());
    let seeds: Vec<String> = servers.iter().map(|s| format!("{}/", s.uri())).collect();
    let config = create_test_config(&seeds, 10);

    // Two processes' worth of engines, each with its own frontier connection
    let first = Engine::from_config(
        &config,
        Arc::new(SqliteFrontier::open(&dir.path().join("frontier.db")).unwrap()),
        fetcher(),
    );
    let second = Engine::from_config(
        &config,
        Arc::new(SqliteFrontier::open(&dir.path().join("frontier.db")).unwrap()),
        fetcher(),
    );
    first.seed(&config.seeds).await.unwrap();

    let (_tx, rx) = watch::channel(false);
    let (a, b) = tokio::join!(
        first.run(pages.clone(), rx.clone()),
        second.run(pages.clone(), rx)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.hosts_claimed + b.hosts_claimed, 3);
    assert_eq!(a.pages + b.pages, 9);
    assert_eq!(pages.count().await.unwrap(), 9);

    for server in &servers {
        for (route, count) in requests_by_path(server).await {
            if route != "/robots.txt" {
                assert_eq!(count, 1, "{} fetched {} times", route, count);
            }
        }
    }
}
