use url::Url;

/// Extracts the host from a URL
///
/// The host is lowercased; the port is not part of it. This is the key used
/// for the domain registry, front sub-bucket hashing and back-queue mapping.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use frontier_service::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the key a robots.txt entry is cached under
///
/// Host plus the port when it is not the scheme's default, so two servers
/// on the same host never share directives.
pub fn robots_authority(url: &Url) -> Option<String> {
    let host = extract_host(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Builds the robots.txt URL for the site serving `url`
///
/// # Examples
///
/// ```
/// use url::Url;
/// use frontier_service::url::robots_url;
///
/// let url = Url::parse("http://example.com:8080/a/b?c=d").unwrap();
/// assert_eq!(robots_url(&url).unwrap().as_str(), "http://example.com:8080/robots.txt");
/// ```
pub fn robots_url(url: &Url) -> Option<Url> {
    let authority = robots_authority(url)?;
    Url::parse(&format!("{}://{}/robots.txt", url.scheme(), authority)).ok()
}
