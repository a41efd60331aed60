use crate::{UrlError, UrlResult};
use url::Url;

/// Validates raw user input and turns it into an absolute crawl seed
///
/// # Validation Steps
///
/// 1. Trim surrounding whitespace
/// 2. Assume `https://` when no `http://` or `https://` prefix is present
/// 3. Parse as an absolute URL; reject if malformed
/// 4. Reject URLs without a host
///
/// # Arguments
///
/// * `raw` - The URL as typed by the user
///
/// # Returns
///
/// * `Ok(Url)` - Canonical absolute URL
/// * `Err(UrlError)` - The input cannot be crawled
///
/// # Examples
///
/// ```
/// use lapse_crawler::url::validate_url;
///
/// let url = validate_url("  example.com ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/");
/// ```
pub fn validate_url(raw: &str) -> UrlResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Invalid("URL is empty".to_string()));
    }

    let candidate = if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| UrlError::Invalid(format!("'{}' is not a valid URL: {}", trimmed, e)))?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost(trimmed.to_string())),
    }
}

fn has_http_scheme(input: &str) -> bool {
    let lower = input
        .get(..8)
        .map(|prefix| prefix.to_ascii_lowercase())
        .unwrap_or_else(|| input.to_ascii_lowercase());
    lower.starts_with("http://") || lower.starts_with("https://")
}
