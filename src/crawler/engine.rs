//! Crawl engine - job orchestration and the breadth-first crawl loop
//!
//! This module drives one job from start to finish:
//! - Validating the seed and probing the host
//! - Managing the frontier queue and visited set
//! - Fetching, parsing, and classifying links
//! - Supervising background domain expiry lookups
//! - Publishing job snapshots and handling stop requests

use crate::config::Config;
use crate::crawler::fetcher::{build_http_clients, fetch_page, HttpClients};
use crate::crawler::parser::parse_html;
use crate::crawler::probe::probe_connection;
use crate::crawler::retry::{retry_with_backoff, RetryPolicy};
use crate::expiry::{DomainCheck, DomainExpiryChecker, ExpiryError};
use crate::state::{Job, JobId, JobStateContainer, JobStatus};
use crate::url::{validate_url, Link, LinkClassifier};
use crate::CrawlError;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use url::Url;

/// How often (in processed pages) progress is logged at info level
const PROGRESS_LOG_INTERVAL: usize = 10;

/// How often the stop registry is checked while waiting for expiry lookups
const DRAIN_STOP_POLL: Duration = Duration::from_millis(250);

/// Runs crawl jobs against a shared state container
///
/// The engine holds no per-job state; every call to [`CrawlEngine::run`] or
/// [`CrawlEngine::spawn`] gets its own frontier, visited set, and expiry
/// lookups. Jobs only share the state container and the expiry checker.
pub struct CrawlEngine {
    clients: HttpClients,
    fetch_policy: RetryPolicy,
    probe_policy: RetryPolicy,
    drain_timeout: Duration,
    store: Arc<dyn JobStateContainer>,
    checker: Arc<dyn DomainExpiryChecker>,
}

impl CrawlEngine {
    /// Creates an engine
    ///
    /// # Arguments
    ///
    /// * `config` - Crawler configuration
    /// * `store` - Where job snapshots are published and stop requests are read
    /// * `checker` - Domain expiry lookup service
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEngine)` - Ready to run jobs
    /// * `Err(CrawlError)` - The HTTP clients could not be built
    pub fn new(
        config: &Config,
        store: Arc<dyn JobStateContainer>,
        checker: Arc<dyn DomainExpiryChecker>,
    ) -> crate::Result<Self> {
        let fetch_policy = RetryPolicy::from_config(&config.retry);
        let probe_policy = RetryPolicy {
            max_attempts: config.probe.max_attempts,
            ..fetch_policy.clone()
        };

        Ok(Self {
            clients: build_http_clients(&config.http)?,
            fetch_policy,
            probe_policy,
            drain_timeout: config.expiry.drain_timeout(),
            store,
            checker,
        })
    }

    /// Starts a job on its own task
    ///
    /// The job is registered with the state container before this returns, so
    /// the id can be polled or stopped right away. If the job's task panics,
    /// the stored job is moved to `error`.
    pub fn spawn(self: &Arc<Self>, input: impl Into<String>) -> (JobId, JoinHandle<Job>) {
        let id = JobId::new();
        let input = input.into();
        self.store.add_job(Job::new(id, input.clone()));

        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let worker = Arc::clone(&engine);
            let run = tokio::spawn(async move { worker.run_registered(id, input).await });

            match run.await {
                Ok(job) => job,
                Err(e) => engine.abandon(id, e),
            }
        });

        (id, handle)
    }

    /// Runs a job to completion on the current task
    ///
    /// Always returns the final job record; failures are reported through its
    /// `status` and `error` fields.
    pub async fn run(&self, input: &str) -> Job {
        let job = Job::new(JobId::new(), input);
        self.store.add_job(job.clone());
        self.execute(job).await
    }

    async fn run_registered(&self, id: JobId, input: String) -> Job {
        let job = self
            .store
            .get_job(&id)
            .unwrap_or_else(|| Job::new(id, input));
        self.execute(job).await
    }

    async fn execute(&self, mut job: Job) -> Job {
        tracing::info!("Job {} started for '{}'", job.id, job.input);

        let seed = match validate_url(&job.input) {
            Ok(seed) => seed,
            Err(e) => {
                self.finish(&mut job, JobStatus::Error, Some(CrawlError::from(e)));
                return job;
            }
        };
        job.seed_url = Some(seed.to_string());
        self.store.update_job(&job);

        if !self.store.is_active(&job.id) {
            tracing::info!("Job {} stopped before probing {}", job.id, seed);
            self.finish(&mut job, JobStatus::Stopped, None);
            return job;
        }

        if let Err(e) = probe_connection(&self.clients, &seed, &self.probe_policy).await {
            self.finish(&mut job, JobStatus::Error, Some(e));
            return job;
        }

        let Some(classifier) = LinkClassifier::new(&seed) else {
            let error = CrawlError::Unhandled(format!("seed {} has no host", seed));
            self.finish(&mut job, JobStatus::Error, Some(error));
            return job;
        };

        let mut run = CrawlRun::new(self, job, classifier, seed);
        let mut status = run.crawl().await;

        if status == JobStatus::Completed {
            status = run.drain_lookups().await;
        } else {
            run.abort_lookups();
        }

        let mut job = run.into_job();
        self.finish(&mut job, status, None);
        job
    }

    /// Moves the job into a terminal state and publishes it
    fn finish(&self, job: &mut Job, status: JobStatus, error: Option<CrawlError>) {
        let message = error.map(|e| e.to_string());
        match (&message, status) {
            (Some(message), _) => tracing::error!("Job {} failed: {}", job.id, message),
            (None, JobStatus::Stopped) => tracing::info!(
                "Job {} stopped after {} pages",
                job.id,
                job.crawled_urls.len()
            ),
            (None, _) => tracing::info!(
                "Job {} {}: {} pages, {} external links, {} expired domains",
                job.id,
                status,
                job.crawled_urls.len(),
                job.external_links.len(),
                job.expired_domains.len()
            ),
        }

        if let Err(e) = job.finish(status, message) {
            tracing::error!("Job {}: {}", job.id, e);
            return;
        }
        self.store.update_job(job);
    }

    /// Records a job whose task died without returning
    fn abandon(&self, id: JobId, error: JoinError) -> Job {
        let mut job = self
            .store
            .get_job(&id)
            .unwrap_or_else(|| Job::new(id, String::new()));

        if !job.is_terminal() {
            let error = CrawlError::Unhandled(format!("crawl task failed: {}", error));
            self.finish(&mut job, JobStatus::Error, Some(error));
        }
        job
    }
}

/// Message produced by a finished expiry lookup task
struct ExpiryOutcome {
    host: String,
    result: Result<DomainCheck, ExpiryError>,
}

/// Transient per-job crawl state
///
/// Owned by exactly one `execute` call; nothing outside the engine sees the
/// frontier or visited set, and only this struct mutates the job while it runs.
struct CrawlRun<'a> {
    engine: &'a CrawlEngine,
    job: Job,
    classifier: LinkClassifier,
    frontier: VecDeque<Url>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    dispatched_hosts: HashSet<String>,
    lookups: JoinSet<ExpiryOutcome>,
}

impl<'a> CrawlRun<'a> {
    fn new(engine: &'a CrawlEngine, job: Job, classifier: LinkClassifier, seed: Url) -> Self {
        let mut queued = HashSet::new();
        queued.insert(seed.to_string());

        Self {
            engine,
            job,
            classifier,
            frontier: VecDeque::from([seed]),
            queued,
            visited: HashSet::new(),
            dispatched_hosts: HashSet::new(),
            lookups: JoinSet::new(),
        }
    }

    fn into_job(self) -> Job {
        self.job
    }

    fn publish(&self) {
        self.engine.store.update_job(&self.job);
    }

    /// The main loop; returns the terminal status it ended in
    async fn crawl(&mut self) -> JobStatus {
        loop {
            self.collect_finished_lookups();

            if !self.engine.store.is_active(&self.job.id) {
                tracing::info!("Job {} removed from active registry", self.job.id);
                return JobStatus::Stopped;
            }

            let Some(url) = self.frontier.pop_front() else {
                tracing::info!("Frontier is empty, job {} complete", self.job.id);
                return JobStatus::Completed;
            };
            self.queued.remove(url.as_str());

            if !self.visited.insert(url.to_string()) {
                continue;
            }

            self.process_url(&url).await;

            let crawled = self.job.crawled_urls.len();
            if crawled % PROGRESS_LOG_INTERVAL == 0 {
                tracing::info!(
                    "Job {} progress: {} pages crawled, {} in frontier ({:.1}%)",
                    self.job.id,
                    crawled,
                    self.frontier.len(),
                    self.job.progress
                );
            }
        }
    }

    /// Fetches one page, records the outcome, and publishes a snapshot
    async fn process_url(&mut self, url: &Url) {
        tracing::debug!("Crawling {}", url);
        let engine = self.engine;

        let result = retry_with_backoff(&engine.fetch_policy, || {
            fetch_page(&engine.clients.default, url)
        })
        .await;

        match result {
            Ok(page) => {
                if page.is_html() {
                    let base = Url::parse(&page.final_url).unwrap_or_else(|_| url.clone());
                    let parsed = parse_html(&page.body);
                    tracing::debug!(
                        "{} ({:?}): {} anchors",
                        base,
                        parsed.title.as_deref().unwrap_or(""),
                        parsed.hrefs.len()
                    );
                    for href in &parsed.hrefs {
                        self.handle_href(href, &base, page.status_code);
                    }
                }

                match page.client_error() {
                    Some(e) => {
                        tracing::warn!("Failed to crawl {}: {}", url, e);
                        self.job.record_failed(url.as_str(), &e.to_string());
                    }
                    None => self.job.record_crawled(url.as_str()),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to crawl {}: {}", url, e);
                self.job.record_failed(url.as_str(), &e.to_string());
            }
        }

        self.job.update_progress(self.frontier.len());
        self.publish();
    }

    fn handle_href(&mut self, href: &str, page_url: &Url, status_code: u16) {
        let Some(link) = self.classifier.classify(href, page_url) else {
            tracing::debug!("Skipping unusable link {:?} on {}", href, page_url);
            return;
        };

        match link {
            Link::External { url, host } => {
                if self.job.add_external_link(url.as_str(), status_code) {
                    self.dispatch_lookup(host);
                }
            }
            Link::Internal(url) => {
                let key = url.to_string();
                if !self.visited.contains(&key) && self.queued.insert(key) {
                    self.frontier.push_back(url);
                }
            }
        }
    }

    /// Starts a background expiry lookup, once per host
    fn dispatch_lookup(&mut self, host: String) {
        if !self.dispatched_hosts.insert(host.clone()) {
            return;
        }

        tracing::debug!("Checking domain expiry for {}", host);
        let checker = Arc::clone(&self.engine.checker);
        self.lookups.spawn(async move {
            let result = checker.check(&host).await;
            ExpiryOutcome { host, result }
        });
    }

    /// Applies lookups that have already finished without waiting for others
    fn collect_finished_lookups(&mut self) {
        let mut changed = false;
        while let Some(joined) = self.lookups.try_join_next() {
            changed |= self.apply_lookup(joined);
        }
        if changed {
            self.publish();
        }
    }

    /// Waits for outstanding lookups, up to the drain timeout
    ///
    /// Returns `Stopped` if the job leaves the active registry while waiting;
    /// the remaining lookups are aborted either way.
    async fn drain_lookups(&mut self) -> JobStatus {
        if self.lookups.is_empty() {
            return JobStatus::Completed;
        }

        tracing::debug!(
            "Waiting for {} domain checks of job {}",
            self.lookups.len(),
            self.job.id
        );
        let deadline = Instant::now() + self.engine.drain_timeout;
        let mut status = JobStatus::Completed;
        let mut changed = false;

        loop {
            let wake = deadline.min(Instant::now() + DRAIN_STOP_POLL);
            let next = tokio::time::timeout_at(wake, self.lookups.join_next()).await;
            match next {
                Ok(Some(joined)) => changed |= self.apply_lookup(joined),
                Ok(None) => break,
                Err(_) if Instant::now() >= deadline => {
                    tracing::warn!(
                        "Abandoning {} domain checks of job {} after {:?}",
                        self.lookups.len(),
                        self.job.id,
                        self.engine.drain_timeout
                    );
                    self.lookups.abort_all();
                    break;
                }
                Err(_) => {
                    if !self.engine.store.is_active(&self.job.id) {
                        tracing::info!(
                            "Job {} stopped while waiting for domain checks",
                            self.job.id
                        );
                        self.lookups.abort_all();
                        status = JobStatus::Stopped;
                        break;
                    }
                }
            }
        }

        if changed {
            self.publish();
        }
        status
    }

    fn abort_lookups(&mut self) {
        if !self.lookups.is_empty() {
            tracing::debug!(
                "Cancelling {} domain checks of job {}",
                self.lookups.len(),
                self.job.id
            );
        }
        self.lookups.abort_all();
    }

    /// Merges one lookup result into the job; returns true if the job changed
    fn apply_lookup(&mut self, joined: Result<ExpiryOutcome, JoinError>) -> bool {
        match joined {
            Ok(ExpiryOutcome {
                host,
                result: Ok(check),
            }) => {
                if !check.is_expired {
                    tracing::debug!("Domain {} (from {}) is registered", check.domain, host);
                    return false;
                }
                let domain = check.domain.clone();
                let added = self.job.add_expired_domain(check);
                if added {
                    tracing::info!("Expired domain found: {} (linked as {})", domain, host);
                }
                added
            }
            Ok(ExpiryOutcome {
                host,
                result: Err(e),
            }) => {
                tracing::warn!("Domain check for {} failed: {}", host, e);
                false
            }
            Err(e) if e.is_cancelled() => false,
            Err(e) => {
                tracing::error!("Domain check task failed: {}", e);
                false
            }
        }
    }
}
