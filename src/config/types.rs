use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Lapse-Crawler
///
/// Every section is optional; missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub probe: ProbeConfig,
    pub expiry: ExpiryConfig,
}

/// HTTP client behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Total request timeout (seconds)
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Maximum number of redirects followed per fetch
    pub max_redirects: usize,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 5,
            user_agent: format!(
                "Mozilla/5.0 (compatible; lapse-crawler/{})",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Page fetch retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per page fetch
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds), doubled on each retry
    pub base_delay_ms: u64,

    /// Upper bound (exclusive) of the random delay added to each retry (milliseconds)
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            jitter_ms: 1000,
        }
    }
}

/// Connection probe behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProbeConfig {
    /// Attempts per request configuration and scheme
    pub max_attempts: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Domain expiry lookups
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExpiryConfig {
    /// RDAP bootstrap service queried for domain registrations
    pub rdap_base_url: String,

    /// Timeout for a single RDAP request (seconds)
    pub timeout_secs: u64,

    /// How long a completed crawl waits for outstanding lookups (seconds)
    pub drain_timeout_secs: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            rdap_base_url: "https://rdap.org".to_string(),
            timeout_secs: 15,
            drain_timeout_secs: 30,
        }
    }
}

impl ExpiryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}
