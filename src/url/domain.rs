use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host, or `None` for URLs without one.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitescribe::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Key identifying the site a URL belongs to
///
/// The host is lowercased and a leading `www.` is dropped, so `example.com`
/// and `www.example.com` are the same site. An explicit non-default port is
/// kept: two servers on one host are different sites, but `http` and `https`
/// on their default ports are not.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitescribe::url::site_key;
///
/// let url = Url::parse("https://www.example.com/docs").unwrap();
/// assert_eq!(site_key(&url), Some("example.com".to_string()));
/// ```
pub fn site_key(url: &Url) -> Option<String> {
    let domain = extract_domain(url)?;
    let host = domain.strip_prefix("www.").unwrap_or(&domain);
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host.to_string()),
    }
}

/// Whether two URLs belong to the same site (see [`site_key`])
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (site_key(a), site_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
