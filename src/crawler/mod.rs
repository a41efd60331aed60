//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and error classification
//! - Retry with exponential backoff and jitter
//! - The pre-crawl connection probe
//! - HTML parsing and anchor extraction
//! - The crawl engine that ties them together

mod engine;
mod fetcher;
mod parser;
mod probe;
mod retry;

pub use engine::CrawlEngine;
pub use fetcher::{
    build_http_clients, check_reachable, fetch_page, is_html_content_type, FetchError,
    FetchedPage, HttpClients,
};
pub use parser::{parse_html, ParsedPage};
pub use probe::{probe_connection, probe_targets, ProbeStrategy};
pub use retry::{retry_with_backoff, RetryPolicy, Retryable};
