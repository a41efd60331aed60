//! Connection probe run before a crawl starts
//!
//! Fails fast with a clear diagnostic when the seed host cannot be reached,
//! instead of discovering it one failed page at a time.

use crate::crawler::fetcher::{check_reachable, FetchError, HttpClients};
use crate::crawler::retry::{retry_with_backoff, RetryPolicy};
use crate::CrawlError;
use reqwest::header;
use reqwest::RequestBuilder;
use url::Url;

/// A request configuration tried by the prober
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Default client and headers
    Default,
    /// Client with proxies disabled
    Direct,
    /// Default client with cache-busting headers
    NoCache,
}

impl ProbeStrategy {
    /// Strategies in the order they are tried
    pub const ALL: [ProbeStrategy; 3] = [
        ProbeStrategy::Default,
        ProbeStrategy::Direct,
        ProbeStrategy::NoCache,
    ];

    fn request(&self, clients: &HttpClients, url: &Url) -> RequestBuilder {
        match self {
            ProbeStrategy::Default => clients.default.get(url.clone()),
            ProbeStrategy::Direct => clients.direct.get(url.clone()),
            ProbeStrategy::NoCache => clients
                .default
                .get(url.clone())
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache"),
        }
    }
}

/// Returns the URLs to probe: the URL itself, then its `http` downgrade if it
/// used `https`
pub fn probe_targets(url: &Url) -> Vec<Url> {
    let mut targets = vec![url.clone()];
    if url.scheme() == "https" {
        let mut downgraded = url.clone();
        if downgraded.set_scheme("http").is_ok() {
            targets.push(downgraded);
        }
    }
    targets
}

/// Confirms that `url` answers before a crawl commits to it
///
/// Every [`ProbeStrategy`] is tried in order, each through the retry
/// executor. Only when all of them fail over `https` is each one tried again
/// over plain `http`. Any HTTP status below 500 counts as reachable.
///
/// # Returns
///
/// * `Ok(())` - Some strategy got an answer
/// * `Err(CrawlError::UnreachableHost)` - Every strategy and scheme failed;
///   carries the last underlying error
pub async fn probe_connection(
    clients: &HttpClients,
    url: &Url,
    policy: &RetryPolicy,
) -> crate::Result<()> {
    let mut last_error: Option<FetchError> = None;

    for (index, target) in probe_targets(url).iter().enumerate() {
        if index > 0 {
            tracing::info!("All probes over https failed, retrying {} over http", url);
        }

        for strategy in ProbeStrategy::ALL {
            let result = retry_with_backoff(policy, || {
                check_reachable(strategy.request(clients, target), target)
            })
            .await;

            match result {
                Ok(status) => {
                    tracing::info!(
                        "Connection probe to {} succeeded ({:?}, HTTP {})",
                        target,
                        strategy,
                        status
                    );
                    return Ok(());
                }
                Err(error) => {
                    tracing::warn!(
                        "Connection probe to {} failed ({:?}): {}",
                        target,
                        strategy,
                        error
                    );
                    last_error = Some(error);
                }
            }
        }
    }

    match last_error {
        Some(source) => Err(CrawlError::UnreachableHost {
            url: url.to_string(),
            source,
        }),
        None => Err(CrawlError::Unhandled(format!(
            "no connection probe was attempted for {}",
            url
        ))),
    }
}
