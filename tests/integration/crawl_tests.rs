//! Integration tests for the crawl engine
//!
//! These tests use wiremock to serve a small site and run whole jobs
//! end-to-end against it, with an in-process fake expiry checker.

use async_trait::async_trait;
use lapse_crawler::config::Config;
use lapse_crawler::crawler::{build_http_clients, probe_connection, RetryPolicy};
use lapse_crawler::expiry::{DomainCheck, DomainExpiryChecker, ExpiryError};
use lapse_crawler::state::{InMemoryJobStore, Job, JobId, JobStateContainer, JobStatus};
use lapse_crawler::CrawlEngine;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Reports the listed hosts as expired and everything else as registered
struct FakeChecker {
    expired: HashSet<String>,
    checked: Mutex<Vec<String>>,
}

impl FakeChecker {
    fn new(expired: &[&str]) -> Self {
        Self {
            expired: expired.iter().map(|h| h.to_string()).collect(),
            checked: Mutex::new(Vec::new()),
        }
    }

    fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl DomainExpiryChecker for FakeChecker {
    async fn check(&self, host: &str) -> Result<DomainCheck, ExpiryError> {
        self.checked.lock().unwrap().push(host.to_string());
        Ok(DomainCheck {
            domain: host.to_string(),
            is_expired: self.expired.contains(host),
            expires_at: None,
            registrar: None,
            checked_at: chrono::Utc::now(),
        })
    }
}

/// How a [`ScriptedChecker`] answers for one host
#[derive(Clone, Copy)]
enum Lookup {
    Expired,
    Fail,
    Panic,
    Hang,
}

/// Checker with per-host behavior; unlisted hosts are registered
struct ScriptedChecker {
    hosts: HashMap<String, Lookup>,
}

impl ScriptedChecker {
    fn new(hosts: &[(&str, Lookup)]) -> Self {
        Self {
            hosts: hosts
                .iter()
                .map(|(host, lookup)| (host.to_string(), *lookup))
                .collect(),
        }
    }
}

#[async_trait]
impl DomainExpiryChecker for ScriptedChecker {
    async fn check(&self, host: &str) -> Result<DomainCheck, ExpiryError> {
        let is_expired = match self.hosts.get(host) {
            Some(Lookup::Expired) => true,
            Some(Lookup::Fail) => {
                return Err(ExpiryError::Status {
                    domain: host.to_string(),
                    status: 503,
                })
            }
            Some(Lookup::Panic) => panic!("lookup for {} blew up", host),
            Some(Lookup::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                false
            }
            None => false,
        };
        Ok(DomainCheck {
            domain: host.to_string(),
            is_expired,
            expires_at: None,
            registrar: None,
            checked_at: chrono::Utc::now(),
        })
    }
}

/// Store that reports a job inactive after a fixed number of polls
struct StopAfterPolls {
    inner: InMemoryJobStore,
    polls_left: AtomicUsize,
}

impl JobStateContainer for StopAfterPolls {
    fn add_job(&self, job: Job) {
        self.inner.add_job(job)
    }

    fn update_job(&self, job: &Job) {
        self.inner.update_job(job)
    }

    fn get_job(&self, id: &JobId) -> Option<Job> {
        self.inner.get_job(id)
    }

    fn jobs(&self) -> Vec<Job> {
        self.inner.jobs()
    }

    fn is_active(&self, id: &JobId) -> bool {
        let left = self.polls_left.load(Ordering::SeqCst);
        if left == 0 {
            self.inner.stop(id);
        } else {
            self.polls_left.store(left - 1, Ordering::SeqCst);
        }
        self.inner.is_active(id)
    }

    fn stop(&self, id: &JobId) -> bool {
        self.inner.stop(id)
    }
}

/// Default configuration with retries that never sleep
fn test_config() -> Config {
    let mut config = Config::default();
    config.http.timeout_secs = 5;
    config.http.connect_timeout_secs = 2;
    config.retry.base_delay_ms = 0;
    config.retry.jitter_ms = 0;
    config.expiry.drain_timeout_secs = 5;
    config
}

fn engine_with(
    store: Arc<dyn JobStateContainer>,
    checker: Arc<dyn DomainExpiryChecker>,
) -> CrawlEngine {
    engine_with_config(&test_config(), store, checker)
}

fn engine_with_config(
    config: &Config,
    store: Arc<dyn JobStateContainer>,
    checker: Arc<dyn DomainExpiryChecker>,
) -> CrawlEngine {
    CrawlEngine::new(config, store, checker).expect("Failed to build engine")
}

/// Seed page linking to one external page per host
async fn mount_links_to(server: &MockServer, hosts: &[&str]) {
    let anchors: String = hosts
        .iter()
        .map(|host| format!(r#"<a href="https://{}/">{}</a>"#, host, host))
        .collect();
    mount_page(server, "/", &anchors).await;
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_is_breadth_first() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<a href="/page1">One</a> <a href="/page2">Two</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/page1",
        r#"<a href="/page3">Three</a> <a href="/">Home</a>"#,
    )
    .await;
    mount_page(&server, "/page2", r#"<a href="/page1">One</a>"#).await;
    mount_page(&server, "/page3", "No links here").await;

    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store.clone(), Arc::new(FakeChecker::new(&[])));

    let job = engine.run(&base).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.error, None);
    assert_eq!(job.progress, 100.0);
    assert!(job.end_time.is_some());
    assert_eq!(
        job.crawled_urls,
        vec![
            format!("{}/", base),
            format!("{}/page1", base),
            format!("{}/page2", base),
            format!("{}/page3", base),
        ]
    );
    assert_eq!(job.failed_count, 0);

    let stored = store.get_job(&job.id).expect("Job should be stored");
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.crawled_urls, job.crawled_urls);
    assert!(!store.is_active(&job.id));
}

#[tokio::test]
async fn test_frontier_grows_by_unseen_links_only() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Three internal anchors: one back to the seed, two unseen (one duplicated)
    mount_page(
        &server,
        "/",
        r#"<a href="/">Home</a> <a href="/a">A</a> <a href="/b">B</a> <a href="/a#top">A again</a>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html("A"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html("B"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store, Arc::new(FakeChecker::new(&[])));

    let job = engine.run(&base).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.crawled_urls.len(), 3);
    assert_eq!(job.crawled_urls[1], format!("{}/a", base));
    assert_eq!(job.crawled_urls[2], format!("{}/b", base));
}

#[tokio::test]
async fn test_expired_domain_reported_on_completion() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<a href="https://expired.test/offer">Gone</a>
           <a href="https://alive.test/">Alive</a>
           <a href="/next">Next</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/next",
        r#"<a href="https://expired.test/other">Gone again</a>"#,
    )
    .await;

    let checker = Arc::new(FakeChecker::new(&["expired.test"]));
    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store.clone(), checker.clone());

    let job = engine.run(&base).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.external_links.len(), 3);
    assert!(job.external_links.iter().all(|link| link.status_code == 200));

    assert_eq!(job.expired_domains.len(), 1);
    assert_eq!(job.expired_domains[0].domain, "expired.test");
    assert!(job.expired_domains[0].is_expired);

    // One lookup per host, however many links point at it
    let mut checked = checker.checked();
    checked.sort();
    assert_eq!(checked, vec!["alive.test", "expired.test"]);

    let stored = store.get_job(&job.id).unwrap();
    assert_eq!(stored.expired_domains, job.expired_domains);
}

#[tokio::test]
async fn test_external_links_are_not_duplicated() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<a href="https://other.test/page">X</a>
           <a href="https://other.test/page#section">X again</a>
           <a href="/more">More</a>"#,
    )
    .await;
    mount_page(&server, "/more", r#"<a href="https://other.test/page">X</a>"#).await;

    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store, Arc::new(FakeChecker::new(&[])));

    let job = engine.run(&base).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.external_links.len(), 1);
    assert_eq!(job.external_links[0].url, "https://other.test/page");
    assert!(job.expired_domains.is_empty());
}

#[tokio::test]
async fn test_client_error_page_is_recorded_once_and_crawl_continues() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<a href="/missing">Missing</a> <a href="/fine">Fine</a>"#,
    )
    .await;
    mount_page(&server, "/fine", "Fine").await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store, Arc::new(FakeChecker::new(&[])));

    let job = engine.run(&base).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.crawled_urls.len(), 3);
    assert_eq!(job.failed_count, 1);
    assert_eq!(
        job.crawled_urls[1],
        format!("{}/missing (Failed: HTTP 404 Not Found)", base)
    );
    assert_eq!(job.crawled_urls[2], format!("{}/fine", base));
}

#[tokio::test]
async fn test_client_error_page_links_are_still_followed() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/gone">Gone</a>"#).await;
    mount_page(&server, "/sitemap", "Sitemap").await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(
            r#"<html><body>Not here. Try <a href="https://partner.test/">our partner</a>
               or the <a href="/sitemap">sitemap</a>.</body></html>"#,
            "text/html",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let checker = Arc::new(FakeChecker::new(&["partner.test"]));
    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store, checker);

    let job = engine.run(&base).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        job.crawled_urls,
        vec![
            format!("{}/", base),
            format!("{}/gone (Failed: HTTP 404 Not Found)", base),
            format!("{}/sitemap", base),
        ]
    );
    assert_eq!(job.failed_count, 1);
    assert_eq!(job.external_links.len(), 1);
    assert_eq!(job.external_links[0].url, "https://partner.test/");
    assert_eq!(job.external_links[0].status_code, 404);
    assert_eq!(job.expired_domains.len(), 1);
    assert_eq!(job.expired_domains[0].domain, "partner.test");
}

#[tokio::test]
async fn test_failed_domain_check_does_not_affect_job() {
    let server = MockServer::start().await;
    mount_links_to(&server, &["expired.test", "flaky.test"]).await;

    let checker = Arc::new(ScriptedChecker::new(&[
        ("expired.test", Lookup::Expired),
        ("flaky.test", Lookup::Fail),
    ]));
    let engine = engine_with(Arc::new(InMemoryJobStore::new()), checker);

    let job = engine.run(&server.uri()).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.error, None);
    assert_eq!(job.external_links.len(), 2);
    assert_eq!(job.expired_domains.len(), 1);
    assert_eq!(job.expired_domains[0].domain, "expired.test");
}

#[tokio::test]
async fn test_panicking_domain_check_does_not_affect_job() {
    let server = MockServer::start().await;
    mount_links_to(&server, &["expired.test", "broken.test"]).await;

    let checker = Arc::new(ScriptedChecker::new(&[
        ("expired.test", Lookup::Expired),
        ("broken.test", Lookup::Panic),
    ]));
    let engine = engine_with(Arc::new(InMemoryJobStore::new()), checker);

    let job = engine.run(&server.uri()).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.error, None);
    assert_eq!(job.expired_domains.len(), 1);
    assert_eq!(job.expired_domains[0].domain, "expired.test");
}

#[tokio::test]
async fn test_slow_domain_checks_are_abandoned_after_drain_timeout() {
    let server = MockServer::start().await;
    mount_links_to(&server, &["expired.test", "slow.test"]).await;

    let mut config = test_config();
    config.expiry.drain_timeout_secs = 1;

    let checker = Arc::new(ScriptedChecker::new(&[
        ("expired.test", Lookup::Expired),
        ("slow.test", Lookup::Hang),
    ]));
    let engine = engine_with_config(&config, Arc::new(InMemoryJobStore::new()), checker);

    let started = std::time::Instant::now();
    let job = engine.run(&server.uri()).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.error, None);
    assert_eq!(job.expired_domains.len(), 1);
    assert_eq!(job.expired_domains[0].domain, "expired.test");
}

#[tokio::test]
async fn test_stop_while_waiting_for_domain_checks() {
    let server = MockServer::start().await;
    mount_links_to(&server, &["slow.test"]).await;

    let checker = Arc::new(ScriptedChecker::new(&[("slow.test", Lookup::Hang)]));
    let store = Arc::new(InMemoryJobStore::new());
    let engine = Arc::new(engine_with(store.clone(), checker));

    let started = std::time::Instant::now();
    let (id, handle) = engine.spawn(server.uri());

    for _ in 0..200 {
        if store.get_job(&id).map_or(0, |job| job.crawled_urls.len()) >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.stop(&id));

    let job = handle.await.expect("Job task should not panic");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(job.status, JobStatus::Stopped);
    assert!(job.expired_domains.is_empty());
}

#[tokio::test]
async fn test_job_stopped_before_start_never_touches_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("never"))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryJobStore::new());
    let engine = Arc::new(engine_with(store.clone(), Arc::new(FakeChecker::new(&[]))));

    // The job task cannot run before this test yields
    let (id, handle) = engine.spawn(server.uri());
    assert!(store.stop(&id));

    let job = handle.await.expect("Job task should not panic");
    assert_eq!(job.status, JobStatus::Stopped);
    assert!(job.crawled_urls.is_empty());
    assert_eq!(job.seed_url, Some(format!("{}/", server.uri())));
}

#[tokio::test]
async fn test_server_error_page_is_retried() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/flaky">Flaky</a>"#).await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store, Arc::new(FakeChecker::new(&[])));

    let job = engine.run(&base).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.failed_count, 1);
    assert!(job.crawled_urls[1].starts_with(&format!("{}/flaky (Failed: HTTP 503", base)));
}

#[tokio::test]
async fn test_unreachable_host_fails_job() {
    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store.clone(), Arc::new(FakeChecker::new(&[])));

    let job = engine.run("http://127.0.0.1:1/").await;

    assert_eq!(job.status, JobStatus::Error);
    let error = job.error.as_deref().expect("Error message should be set");
    assert!(error.starts_with("Cannot connect to http://127.0.0.1:1/"), "{}", error);
    assert!(job.crawled_urls.is_empty());
    assert!(job.end_time.is_some());
    assert!(!store.is_active(&job.id));
}

#[tokio::test]
async fn test_invalid_url_fails_without_network() {
    let store = Arc::new(InMemoryJobStore::new());
    let engine = engine_with(store, Arc::new(FakeChecker::new(&[])));

    let job = engine.run("http://exa mple.com").await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.seed_url, None);
    assert!(job
        .error
        .as_deref()
        .unwrap_or_default()
        .starts_with("Invalid URL format"));
}

#[tokio::test]
async fn test_stop_ends_crawl_before_next_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        r#"<a href="/page1">One</a> <a href="/page2">Two</a>"#,
    )
    .await;

    for page in ["/page1", "/page2"] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(html("never"))
            .expect(0)
            .mount(&server)
            .await;
    }

    let store = Arc::new(StopAfterPolls {
        inner: InMemoryJobStore::new(),
        polls_left: AtomicUsize::new(2),
    });
    let engine = engine_with(store.clone(), Arc::new(FakeChecker::new(&[])));

    let job = engine.run(&base).await;

    assert_eq!(job.status, JobStatus::Stopped);
    assert_eq!(job.error, None);
    assert_eq!(job.crawled_urls, vec![format!("{}/", base)]);
    assert_eq!(store.get_job(&job.id).unwrap().status, JobStatus::Stopped);
}

#[tokio::test]
async fn test_spawned_job_is_observable_and_stoppable() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", r#"<a href="/slow">Slow</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html(r#"<a href="/slower">Slower</a>"#).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slower"))
        .respond_with(html("never"))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryJobStore::new());
    let engine = Arc::new(engine_with(store.clone(), Arc::new(FakeChecker::new(&[]))));

    let (id, handle) = engine.spawn(base.as_str());
    let registered = store.get_job(&id).expect("Job registered on spawn");
    assert_eq!(registered.status, JobStatus::Running);
    assert!(store.is_active(&id));

    // Wait until the seed page is recorded, then stop while /slow is in flight
    for _ in 0..100 {
        if store.get_job(&id).map_or(0, |job| job.crawled_urls.len()) >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.stop(&id));

    let job = handle.await.expect("Job task should not panic");
    assert_eq!(job.status, JobStatus::Stopped);
    assert!(!job.crawled_urls.is_empty() && job.crawled_urls.len() <= 2);
    assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Stopped);
}

#[tokio::test]
async fn test_probe_downgrades_to_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("up"))
        .mount(&server)
        .await;

    let clients = build_http_clients(&test_config().http).unwrap();
    let policy = RetryPolicy::new(1, Duration::ZERO).with_jitter(Duration::ZERO);

    // The mock server only speaks plain HTTP
    let https = url::Url::parse(&server.uri().replacen("http://", "https://", 1)).unwrap();
    assert!(probe_connection(&clients, &https, &policy).await.is_ok());
}

#[tokio::test]
async fn test_probe_accepts_client_errors_as_reachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let clients = build_http_clients(&test_config().http).unwrap();
    let policy = RetryPolicy::new(3, Duration::ZERO).with_jitter(Duration::ZERO);
    let seed = url::Url::parse(&server.uri()).unwrap();

    assert!(probe_connection(&clients, &seed, &policy).await.is_ok());
}
