use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docent::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs live on the same site
///
/// Sites are compared by host (ignoring a leading `www.`) and effective port,
/// so `http://www.example.com/a` and `http://example.com:80/b` match while
/// two local mock servers on different ports do not.
pub fn is_same_site(a: &Url, b: &Url) -> bool {
    let host = |url: &Url| {
        extract_domain(url).map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
    };

    match (host(a), host(b)) {
        (Some(ha), Some(hb)) => ha == hb && a.port_or_known_default() == b.port_or_known_default(),
        _ => false,
    }
}
