//! Human-readable job reports
//!
//! Summarizes a finished (or still running) job the way the CLI prints it.

use crate::state::{Job, JobStatus};
use crate::url::extract_domain;
use std::collections::BTreeSet;
use url::Url;

/// Number of most recently crawled pages listed in a report
const RECENT_PAGES: usize = 5;

/// Counts derived from a job snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct JobSummary {
    pub status: JobStatus,
    pub seed: String,

    /// Entries in `crawled_urls`, failed ones included
    pub pages_crawled: usize,

    pub pages_failed: usize,

    pub external_links: usize,

    /// Distinct hosts among the external links
    pub external_hosts: usize,

    pub expired_domains: usize,

    /// Wall time from start to end (or to now for running jobs), in seconds
    pub duration_seconds: i64,

    pub error: Option<String>,
}

impl JobSummary {
    pub fn from_job(job: &Job) -> Self {
        let external_hosts = job
            .external_links
            .iter()
            .filter_map(|link| Url::parse(&link.url).ok())
            .filter_map(|url| extract_domain(&url))
            .collect::<BTreeSet<_>>()
            .len();

        let end = job.end_time.unwrap_or_else(chrono::Utc::now);

        Self {
            status: job.status,
            seed: job.seed_url.clone().unwrap_or_else(|| job.input.clone()),
            pages_crawled: job.crawled_urls.len(),
            pages_failed: job.failed_count,
            external_links: job.external_links.len(),
            external_hosts,
            expired_domains: job.expired_domains.len(),
            duration_seconds: (end - job.start_time).num_seconds().max(0),
            error: job.error.clone(),
        }
    }

    /// Share of crawled pages that were fetched successfully, in percent
    pub fn success_rate(&self) -> f64 {
        if self.pages_crawled == 0 {
            return 0.0;
        }
        let succeeded = self.pages_crawled - self.pages_failed;
        succeeded as f64 / self.pages_crawled as f64 * 100.0
    }
}

/// Renders a job report as text
pub fn format_report(job: &Job) -> String {
    let summary = JobSummary::from_job(job);
    let mut out = String::new();

    out.push_str(&format!("=== Job {} ===\n\n", job.id));
    out.push_str(&format!("Seed: {}\n", summary.seed));
    out.push_str(&format!("Status: {}\n", summary.status));
    if let Some(error) = &summary.error {
        out.push_str(&format!("Error: {}\n", error));
    }
    out.push_str(&format!("Duration: {}s\n\n", summary.duration_seconds));

    out.push_str("Overview:\n");
    out.push_str(&format!(
        "  Pages crawled: {} ({} failed, {:.1}% success)\n",
        summary.pages_crawled,
        summary.pages_failed,
        summary.success_rate()
    ));
    out.push_str(&format!(
        "  External links: {} across {} hosts\n",
        summary.external_links, summary.external_hosts
    ));
    out.push_str(&format!("  Expired domains: {}\n", summary.expired_domains));

    if !job.expired_domains.is_empty() {
        out.push_str("\nExpired Domains:\n");
        for check in &job.expired_domains {
            match check.expires_at {
                Some(at) => out.push_str(&format!(
                    "  - {} (expired {})\n",
                    check.domain,
                    at.format("%Y-%m-%d")
                )),
                None => out.push_str(&format!("  - {} (not registered)\n", check.domain)),
            }
        }
    }

    if !job.crawled_urls.is_empty() {
        out.push_str("\nRecent Pages:\n");
        let skip = job.crawled_urls.len().saturating_sub(RECENT_PAGES);
        for entry in job.crawled_urls.iter().skip(skip) {
            out.push_str(&format!("  - {}\n", entry));
        }
    }

    if !job.external_links.is_empty() {
        out.push_str("\nExternal Links:\n");
        for link in &job.external_links {
            out.push_str(&format!("  - {} [{}]\n", link.url, link.status_code));
        }
    }

    if summary.pages_failed > 0 {
        out.push_str("\nFailed Pages:\n");
        for entry in job.crawled_urls.iter().filter(|e| e.contains(" (Failed: ")) {
            out.push_str(&format!("  - {}\n", entry));
        }
    }

    out
}

/// Prints a job report to stdout
pub fn print_report(job: &Job) {
    println!("{}", format_report(job));
}
