//! Output module for presenting job results
//!
//! This module handles:
//! - Plain text reports of a job's results
//! - JSON export of job snapshots

mod report;

pub use report::{format_report, print_report, JobSummary};

use crate::state::Job;

/// Renders job snapshots as pretty-printed JSON
pub fn render_json(jobs: &[Job]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(jobs)
}
