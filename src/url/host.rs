use crate::{UrlError, UrlResult};
use url::Url;

/// Canonicalizes a bare host name: lowercase, no `www.` prefix
///
/// # Examples
///
/// ```
/// use spider::url::canonical_host;
///
/// assert_eq!(canonical_host("WWW.Example.com"), "example.com");
/// assert_eq!(canonical_host("blog.example.com"), "blog.example.com");
/// ```
pub fn canonical_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Extracts the frontier host key of a URL
///
/// The key is the canonical host plus any non-default port, so that
/// `example.com` and `example.com:8080` are scheduled as distinct hosts.
///
/// # Examples
///
/// ```
/// use spider::url::host_key;
///
/// assert_eq!(host_key("https://www.example.com/a").unwrap(), "example.com");
/// assert_eq!(host_key("https://example.com:8443/").unwrap(), "example.com:8443");
/// ```
pub fn host_key(url: &str) -> UrlResult<String> {
    let parsed = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(UrlError::InvalidScheme(parsed.scheme().to_string()));
    }

    let host = parsed
        .host_str()
        .map(canonical_host)
        .filter(|h| !h.is_empty())
        .ok_or(UrlError::MissingHost)?;

    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
