use url::Url;

/// A resolved hyperlink, classified relative to the crawl seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Same host as the seed; a traversal candidate
    Internal(Url),

    /// Different host; recorded and checked for expiry, never fetched
    External { url: Url, host: String },
}

impl Link {
    pub fn url(&self) -> &Url {
        match self {
            Link::Internal(url) => url,
            Link::External { url, .. } => url,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Link::External { .. })
    }
}

/// Resolves hrefs found on crawled pages and sorts them into internal and
/// external links
///
/// A link is external if and only if its hostname differs from the seed's
/// hostname. Subdomains count as different hosts (`blog.example.com` is
/// external to `example.com`).
#[derive(Debug, Clone)]
pub struct LinkClassifier {
    seed_host: String,
}

impl LinkClassifier {
    /// Creates a classifier for the given seed URL
    ///
    /// Returns `None` if the seed has no host.
    pub fn new(seed: &Url) -> Option<Self> {
        seed.host_str().map(|host| Self {
            seed_host: host.to_string(),
        })
    }

    pub fn seed_host(&self) -> &str {
        &self.seed_host
    }

    /// Resolves `href` against `page_url` and classifies the result
    ///
    /// Returns `None` for references that should not be followed or recorded:
    /// - empty and fragment-only hrefs
    /// - `javascript:`, `mailto:`, `tel:` and `data:` references
    /// - anything that fails to resolve to an absolute http(s) URL with a host
    ///
    /// The fragment is removed from the resolved URL.
    pub fn classify(&self, href: &str, page_url: &Url) -> Option<Link> {
        let mut url = resolve_href(href, page_url)?;
        url.set_fragment(None);

        let host = url.host_str()?.to_string();
        if host == self.seed_host {
            Some(Link::Internal(url))
        } else {
            Some(Link::External { url, host })
        }
    }
}

fn resolve_href(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let resolved = base_url.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}
