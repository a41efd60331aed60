//! Lapse-Crawler: a single-site crawler that hunts for lapsed external domains
//!
//! This crate walks one website breadth-first from a seed URL, records every
//! external link it finds, and checks in the background whether the
//! registration of each external host has expired. Every crawl is tracked as
//! an observable [`state::Job`] that can be polled and stopped while it runs.

pub mod config;
pub mod crawler;
pub mod expiry;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawl jobs
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Cannot connect to {url}: {source}")]
    UnreachableHost {
        url: String,
        source: crawler::FetchError,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid job transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobStatus,
        to: state::JobStatus,
    },

    #[error("Crawl aborted: {0}")]
    Unhandled(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("{0}")]
    Invalid(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::CrawlEngine;
pub use expiry::{DomainCheck, DomainExpiryChecker, RdapChecker};
pub use state::{InMemoryJobStore, Job, JobId, JobStateContainer, JobStatus};
pub use crate::url::{validate_url, Link, LinkClassifier};
