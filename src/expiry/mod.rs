//! Domain expiry checks
//!
//! The crawl engine only knows the [`DomainExpiryChecker`] trait; lookups run
//! in background tasks and their results are merged into the job by the
//! engine. [`RdapChecker`] is the production implementation.

mod rdap;

pub use rdap::RdapChecker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of looking up one domain's registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCheck {
    /// Name that was looked up
    pub domain: String,

    /// True if the registration has lapsed or the name is unregistered
    pub is_expired: bool,

    /// Registration expiry date, when the registry reports one
    pub expires_at: Option<DateTime<Utc>>,

    /// Sponsoring registrar, when the registry reports one
    pub registrar: Option<String>,

    pub checked_at: DateTime<Utc>,
}

/// Errors from a single expiry lookup
///
/// These never affect a job's status; the engine logs and discards them.
#[derive(Debug, Error)]
pub enum ExpiryError {
    #[error("lookup request for {domain} failed: {source}")]
    Request {
        domain: String,
        source: reqwest::Error,
    },

    #[error("registry returned HTTP {status} for {domain}")]
    Status { domain: String, status: u16 },

    #[error("unreadable registry response for {domain}: {message}")]
    Parse { domain: String, message: String },
}

/// Something that can tell whether a host's domain registration has expired
#[async_trait]
pub trait DomainExpiryChecker: Send + Sync {
    async fn check(&self, host: &str) -> Result<DomainCheck, ExpiryError>;
}
