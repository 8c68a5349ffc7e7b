//! HTTP fetcher for robots.txt
//!
//! This module handles the network side of robots.txt retrieval:
//! - Building the HTTP client with the configured user agent and timeouts
//! - Issuing single-hop GET requests (redirects are followed by the caller)
//! - Capping the body size while it streams in
//! - Classifying every outcome into `RobotsFetchOutcome`

use crate::config::RobotsConfig;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Result of one robots.txt request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsFetchOutcome {
    /// 2xx with a readable body
    Success {
        body: String,
        /// Content-Type header value, if the server sent one
        content_type: Option<String>,
    },

    /// 300/301/302/303/307/308 with a Location header (unresolved)
    Redirect(String),

    /// Body (or declared Content-Length) larger than the byte cap
    TooLarge(usize),

    /// 4xx, or any other non-success status
    ClientError(u16),

    /// 5xx
    ServerError(u16),

    /// Neither plain text nor HTML
    UnsupportedContentType(String),

    /// Timeout, connection error, DNS failure, broken body stream
    Network(String),
}

/// Issues a single robots.txt request
///
/// Implementations must not follow redirects themselves.
#[async_trait]
pub trait RobotsFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> RobotsFetchOutcome;
}

/// Builds an HTTP client for robots.txt requests
///
/// # Arguments
///
/// * `config` - The robots configuration (user agent, timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use frontier_service::config::RobotsConfig;
/// use frontier_service::robots::build_http_client;
///
/// let client = build_http_client(&RobotsConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &RobotsConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_millis(config.timeout_ms);

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher with a body size cap
pub struct HttpRobotsFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpRobotsFetcher {
    pub fn new(client: Client, max_bytes: usize) -> Self {
        Self { client, max_bytes }
    }

    /// Builds the client from configuration
    pub fn from_config(config: &RobotsConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?, config.max_bytes))
    }
}

#[async_trait]
impl RobotsFetcher for HttpRobotsFetcher {
    async fn fetch(&self, url: &Url) -> RobotsFetchOutcome {
        let mut response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(&e),
        };

        let status = response.status();

        if is_followed_redirect(status) {
            return match response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                Some(location) => RobotsFetchOutcome::Redirect(location.to_string()),
                None => RobotsFetchOutcome::ClientError(status.as_u16()),
            };
        }

        if status.is_server_error() {
            return RobotsFetchOutcome::ServerError(status.as_u16());
        }

        if !status.is_success() {
            return RobotsFetchOutcome::ClientError(status.as_u16());
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_lowercase());

        if let Some(content_type) = &content_type {
            if !content_type.contains("text") && !content_type.contains("html") {
                return RobotsFetchOutcome::UnsupportedContentType(content_type.clone());
            }
        }

        if let Some(declared) = response.content_length() {
            if declared as usize > self.max_bytes {
                return RobotsFetchOutcome::TooLarge(declared as usize);
            }
        }

        // Content-Length may be absent or wrong, so enforce the cap while reading
        let mut body: Vec<u8> = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if body.len() > self.max_bytes {
                        return RobotsFetchOutcome::TooLarge(body.len());
                    }
                }
                Ok(None) => break,
                Err(e) => return classify_error(&e),
            }
        }

        RobotsFetchOutcome::Success {
            body: String::from_utf8_lossy(&body).into_owned(),
            content_type,
        }
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MULTIPLE_CHOICES
            | StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn classify_error(e: &reqwest::Error) -> RobotsFetchOutcome {
    if e.is_timeout() {
        RobotsFetchOutcome::Network("Request timeout".to_string())
    } else if e.is_connect() {
        RobotsFetchOutcome::Network("Connection refused".to_string())
    } else {
        RobotsFetchOutcome::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> RobotsConfig {
        RobotsConfig {
            user_agent: "TestBot/1.0".to_string(),
            timeout_ms: 200,
            max_bytes: 64,
            ..RobotsConfig::default()
        }
    }

    fn robots_url(server: &MockServer) -> Url {
        Url::parse(&format!("{}/robots.txt", server.uri())).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config()).is_ok());
    }

    #[tokio::test]
    async fn test_success_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("User-agent: *\nDisallow: /x"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpRobotsFetcher::from_config(&create_test_config()).unwrap();
        let outcome = fetcher.fetch(&robots_url(&server)).await;

        assert_eq!(
            outcome,
            RobotsFetchOutcome::Success {
                body: "User-agent: *\nDisallow: /x".to_string(),
                content_type: Some("text/plain".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_redirect_is_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/moved.txt"))
            .mount(&server)
            .await;

        let fetcher = HttpRobotsFetcher::from_config(&create_test_config()).unwrap();
        let outcome = fetcher.fetch(&robots_url(&server)).await;

        assert_eq!(outcome, RobotsFetchOutcome::Redirect("/moved.txt".to_string()));
    }

    #[tokio::test]
    async fn test_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("x".repeat(100)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpRobotsFetcher::from_config(&create_test_config()).unwrap();
        let outcome = fetcher.fetch(&robots_url(&server)).await;

        assert!(matches!(outcome, RobotsFetchOutcome::TooLarge(n) if n > 64));
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpRobotsFetcher::from_config(&create_test_config()).unwrap();
        assert_eq!(
            fetcher.fetch(&robots_url(&server)).await,
            RobotsFetchOutcome::ServerError(503)
        );

        let missing = Url::parse(&format!("{}/missing.txt", server.uri())).unwrap();
        assert_eq!(
            fetcher.fetch(&missing).await,
            RobotsFetchOutcome::ClientError(404)
        );
    }

    #[tokio::test]
    async fn test_binary_content_type_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0u8; 8]),
            )
            .mount(&server)
            .await;

        let fetcher = HttpRobotsFetcher::from_config(&create_test_config()).unwrap();
        let outcome = fetcher.fetch(&robots_url(&server)).await;

        assert_eq!(
            outcome,
            RobotsFetchOutcome::UnsupportedContentType("image/png".to_string())
        );
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /")
                    .set_delay(Duration::from_millis(1_000)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpRobotsFetcher::from_config(&create_test_config()).unwrap();
        let outcome = fetcher.fetch(&robots_url(&server)).await;

        assert!(matches!(outcome, RobotsFetchOutcome::Network(_)));
    }
}
