//! URL handling module for Lapse-Crawler
//!
//! This module provides seed validation, domain extraction, and the
//! internal/external link classification that decides what gets crawled and
//! what gets checked for expiry.

mod classify;
mod domain;
mod validate;

// Re-export main functions
pub use classify::{Link, LinkClassifier};
pub use domain::{extract_domain, registry_name};
pub use validate::validate_url;
