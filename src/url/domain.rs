use url::Url;

/// Extracts the host from a URL
///
/// The `url` crate already lowercases registered domain names, so the host
/// is returned as parsed.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use lapse_crawler::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the name to look up in a domain registry for a host
///
/// Strips a trailing dot and a leading `www.` label; registries know
/// `example.com`, not `www.example.com`.
///
/// # Examples
///
/// ```
/// use lapse_crawler::url::registry_name;
///
/// assert_eq!(registry_name("www.example.com"), "example.com");
/// assert_eq!(registry_name("Docs.Example.com."), "docs.example.com");
/// ```
pub fn registry_name(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) if rest.contains('.') => rest.to_string(),
        _ => host,
    }
}
