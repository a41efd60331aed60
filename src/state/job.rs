//! Job record definitions
//!
//! A [`Job`] is both the crawl engine's working record and the snapshot it
//! publishes to the state container after every state-affecting step.

use crate::expiry::DomainCheck;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a crawl job
///
/// `Running` is the only non-terminal state. Once a job is `Completed`,
/// `Error` or `Stopped` it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// The crawl loop is (or is about to be) running
    Running,

    /// The frontier was exhausted
    Completed,

    /// Validation, probing, or an unexpected failure ended the job
    Error,

    /// The job was removed from the active registry before finishing
    Stopped,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An external link found while crawling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub url: String,

    /// Status of the page fetch on which the link was first seen
    pub status_code: u16,
}

/// Observable record of one crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,

    /// The string the job was started with
    pub input: String,

    /// Validated seed; `None` until validation succeeds
    pub seed_url: Option<String>,

    pub status: JobStatus,

    /// Estimated completion percentage in `[0, 100]`
    ///
    /// Computed as crawled / (crawled + frontier). The frontier grows as links
    /// are discovered, so this can go down as well as up.
    pub progress: f64,

    /// Processed URLs in visitation order; failed fetches carry their cause
    pub crawled_urls: Vec<String>,

    /// Number of `crawled_urls` entries that record a failed fetch
    pub failed_count: usize,

    pub external_links: Vec<ExternalLink>,

    pub expired_domains: Vec<DomainCheck>,

    pub start_time: DateTime<Utc>,

    pub end_time: Option<DateTime<Utc>>,

    pub error: Option<String>,
}

impl Job {
    /// Creates a running job for the given input
    pub fn new(id: JobId, input: impl Into<String>) -> Self {
        Self {
            id,
            input: input.into(),
            seed_url: None,
            status: JobStatus::Running,
            progress: 0.0,
            crawled_urls: Vec::new(),
            failed_count: 0,
            external_links: Vec::new(),
            expired_domains: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records a successfully processed page
    pub fn record_crawled(&mut self, url: &str) {
        self.crawled_urls.push(url.to_string());
    }

    /// Records a page whose fetch failed, annotated with the cause
    pub fn record_failed(&mut self, url: &str, cause: &str) {
        self.crawled_urls.push(format!("{} (Failed: {})", url, cause));
        self.failed_count += 1;
    }

    /// Appends an external link unless its URL is already recorded
    ///
    /// Returns true if the link was new.
    pub fn add_external_link(&mut self, url: &str, status_code: u16) -> bool {
        if self.has_external_link(url) {
            return false;
        }
        self.external_links.push(ExternalLink {
            url: url.to_string(),
            status_code,
        });
        true
    }

    pub fn has_external_link(&self, url: &str) -> bool {
        self.external_links.iter().any(|link| link.url == url)
    }

    /// Appends an expiry result unless its domain is already recorded
    ///
    /// Returns true if the domain was new.
    pub fn add_expired_domain(&mut self, check: DomainCheck) -> bool {
        if self.expired_domains.iter().any(|d| d.domain == check.domain) {
            return false;
        }
        self.expired_domains.push(check);
        true
    }

    /// Recomputes `progress` from the processed count and frontier size
    ///
    /// This is an estimate: the frontier grows as links are discovered, so
    /// the value can move backwards between pages.
    pub fn update_progress(&mut self, frontier_len: usize) {
        let crawled = self.crawled_urls.len();
        let total = crawled + frontier_len;
        self.progress = if total == 0 {
            0.0
        } else {
            (crawled as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
    }

    /// Moves the job into a terminal state
    ///
    /// `error` is only kept when `status` is [`JobStatus::Error`].
    pub fn finish(&mut self, status: JobStatus, error: Option<String>) -> Result<(), CrawlError> {
        if self.status.is_terminal() || !status.is_terminal() {
            return Err(CrawlError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }

        self.status = status;
        self.end_time = Some(Utc::now());
        if status == JobStatus::Error {
            self.error = error;
        }
        if status == JobStatus::Completed {
            self.progress = 100.0;
        }
        Ok(())
    }
}
