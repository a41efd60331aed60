//! State module for tracking crawl jobs
//!
//! # Components
//!
//! - `Job`: the observable record of one crawl (status, progress, results)
//! - `JobStatus`: the job lifecycle (`running` and the three terminal states)
//! - `JobStateContainer`: where jobs are published, polled, and stopped
//! - `InMemoryJobStore`: the in-process container used by the CLI and tests

mod job;
mod store;

// Re-export main types
pub use job::{ExternalLink, Job, JobId, JobStatus};
pub use store::{InMemoryJobStore, JobStateContainer};
