//! Configuration module for Lapse-Crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every setting has a default, so running without a file is equivalent to
//! loading an empty one.
//!
//! # Example
//!
//! ```no_run
//! use lapse_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("lapse.toml")).unwrap();
//! println!("Retrying each page up to {} times", config.retry.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, ExpiryConfig, HttpConfig, ProbeConfig, RetryConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
