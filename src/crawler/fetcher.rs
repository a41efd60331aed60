//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with browser-like default headers
//! - GET requests to fetch page content
//! - Error classification for the retry executor

use crate::config::HttpConfig;
use crate::crawler::retry::Retryable;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{redirect::Policy, Client, ClientBuilder, RequestBuilder, StatusCode};
use thiserror::Error;
use url::Url;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// The pair of clients the crawler needs
///
/// `direct` bypasses any system proxy; the connection prober falls back to it
/// when the default client cannot get through.
#[derive(Debug, Clone)]
pub struct HttpClients {
    pub default: Client,
    pub direct: Client,
}

/// A page fetched with a status below 500
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against it
    pub final_url: String,
    pub status_code: u16,
    /// Content-Type header value (empty if missing)
    pub content_type: String,
    /// Body text; only read for HTML pages
    pub body: String,
}

impl FetchedPage {
    /// Returns true if the declared content type is HTML or XHTML
    pub fn is_html(&self) -> bool {
        is_html_content_type(&self.content_type)
    }

    /// The failure to record for a 4xx page
    ///
    /// A 4xx page still completes the fetch: its links are followed, but the
    /// page itself is reported as failed.
    pub fn client_error(&self) -> Option<FetchError> {
        let status = StatusCode::from_u16(self.status_code).ok()?;
        match FetchError::from_status(&self.final_url, status) {
            Some(error @ FetchError::Client { .. }) => Some(error),
            _ => None,
        }
    }
}

/// Why a single request failed
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP 4xx; never retried
    #[error("HTTP {status}")]
    Client { url: String, status: StatusCode },

    /// HTTP 5xx
    #[error("HTTP {status}")]
    Server { url: String, status: StatusCode },

    #[error("request timed out")]
    Timeout { url: String },

    #[error("connection failed: {source}")]
    Connect { url: String, source: reqwest::Error },

    /// Redirect limit exceeded or redirect loop; never retried
    #[error("too many redirects")]
    Redirect { url: String },

    #[error("request failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("failed to read body: {source}")]
    Body { url: String, source: reqwest::Error },
}

impl FetchError {
    /// The URL the failing request was sent to
    pub fn url(&self) -> &str {
        match self {
            FetchError::Client { url, .. }
            | FetchError::Server { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Connect { url, .. }
            | FetchError::Redirect { url }
            | FetchError::Request { url, .. }
            | FetchError::Body { url, .. } => url,
        }
    }

    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Client { status, .. } | FetchError::Server { status, .. } => {
                Some(status.as_u16())
            }
            _ => None,
        }
    }

    /// Classifies a transport-level reqwest error
    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            FetchError::Timeout { url }
        } else if error.is_redirect() {
            FetchError::Redirect { url }
        } else if error.is_connect() {
            FetchError::Connect { url, source: error }
        } else {
            FetchError::Request { url, source: error }
        }
    }

    /// Maps an error status to the matching variant; `None` below 400
    fn from_status(url: &str, status: StatusCode) -> Option<Self> {
        let url = url.to_string();
        if status.as_u16() >= 500 {
            Some(FetchError::Server { url, status })
        } else if status.is_client_error() {
            Some(FetchError::Client { url, status })
        } else {
            None
        }
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Client { .. } | FetchError::Redirect { .. })
    }
}

/// Returns true for `text/html` and `application/xhtml+xml` content types
pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

fn client_builder(config: &HttpConfig) -> ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE),
    );

    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
}

/// Builds the default and proxy-bypassing HTTP clients
///
/// # Example
///
/// ```no_run
/// use lapse_crawler::config::HttpConfig;
/// use lapse_crawler::crawler::build_http_clients;
///
/// let clients = build_http_clients(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_clients(config: &HttpConfig) -> Result<HttpClients, reqwest::Error> {
    Ok(HttpClients {
        default: client_builder(config).build()?,
        direct: client_builder(config).no_proxy().build()?,
    })
}

/// Sends a prepared request and classifies the response status
///
/// Returns the response for statuses below 400.
async fn send(request: RequestBuilder, url: &Url) -> Result<reqwest::Response, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

    match FetchError::from_status(url.as_str(), response.status()) {
        Some(error) => Err(error),
        None => Ok(response),
    }
}

/// Fetches a page for traversal
///
/// # Result Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | Status < 400 | `Ok(FetchedPage)`, body read only for HTML |
/// | HTTP 4xx | `Ok(FetchedPage)`; see [`FetchedPage::client_error`] |
/// | HTTP 5xx | `FetchError::Server` |
/// | Timeout | `FetchError::Timeout` |
/// | Connection refused, DNS, TLS | `FetchError::Connect` |
/// | Redirect cap exceeded | `FetchError::Redirect` (not retried) |
pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

    let status = response.status();
    if let Some(error @ FetchError::Server { .. }) = FetchError::from_status(url.as_str(), status)
    {
        return Err(error);
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = if is_html_content_type(&content_type) {
        response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?
    } else {
        String::new()
    };

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body,
    })
}

/// Sends a reachability request; any status below 500 counts as reachable
///
/// The body is never read.
pub async fn check_reachable(request: RequestBuilder, url: &Url) -> Result<u16, FetchError> {
    match send(request, url).await {
        Ok(response) => Ok(response.status().as_u16()),
        Err(FetchError::Client { status, .. }) => Ok(status.as_u16()),
        Err(error) => Err(error),
    }
}
