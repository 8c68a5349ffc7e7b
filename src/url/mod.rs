//! URL handling for the frontier
//!
//! Parsing of incoming crawl URLs, host extraction, and the stable host
//! hash that drives both front sub-bucket and back-queue assignment.

mod domain;
mod hash;

pub use domain::{extract_host, robots_authority, robots_url};
pub use hash::host_hash;

use crate::{UrlError, UrlResult};
use url::Url;

/// Parses a URL submitted for crawling
///
/// Leading/trailing whitespace is ignored. Only `http` and `https` URLs
/// with a host are accepted.
///
/// # Examples
///
/// ```
/// use frontier_service::url::parse_crawl_url;
///
/// let url = parse_crawl_url(" https://Example.com/a ").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(parse_crawl_url("").is_err());
/// assert!(parse_crawl_url("ftp://example.com/").is_err());
/// ```
pub fn parse_crawl_url(raw: &str) -> UrlResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url = Url::parse(trimmed).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_https() {
        let url = parse_crawl_url("https://example.com/page").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_parse_valid_http() {
        assert!(parse_crawl_url("http://example.com/").is_ok());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let url = parse_crawl_url("  https://example.com/x\n").unwrap();
        assert_eq!(url.path(), "/x");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_crawl_url(""), Err(UrlError::Empty));
        assert_eq!(parse_crawl_url("   "), Err(UrlError::Empty));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_crawl_url("not a url"),
            Err(UrlError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(matches!(
            parse_crawl_url("mailto:someone@example.com"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(matches!(
            parse_crawl_url("ftp://example.com/file"),
            Err(UrlError::InvalidScheme(_))
        ));
    }
}
