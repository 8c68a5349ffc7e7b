//! Admission outcomes

use super::front::FrontQueueKey;
use crate::UrlError;
use thiserror::Error;
use url::Url;

/// A URL accepted into a front queue
#[derive(Debug, Clone, PartialEq)]
pub struct Admitted {
    pub url: Url,
    pub host: String,

    /// The sub-queue that took the URL (may be a fallback)
    pub queue: FrontQueueKey,

    /// Seconds a fetcher should leave between requests to this host
    pub crawl_delay: f64,
}

/// Why a URL was not admitted
///
/// None of these are retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Malformed URL: {0}")]
    Malformed(#[from] UrlError),

    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),

    #[error("All queues full for {0}")]
    AllQueuesFull(String),

    #[error("Domain registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The admission task of a batch panicked or was cancelled
    #[error("Admission aborted: {0}")]
    Aborted(String),
}

/// Fieldless kind of a `Rejection`, used as a metrics key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectReason {
    Malformed,
    UnknownDomain,
    RobotsDisallowed,
    AllQueuesFull,
    RegistryUnavailable,
    Aborted,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Malformed => "malformed",
            RejectReason::UnknownDomain => "unknown-domain",
            RejectReason::RobotsDisallowed => "robots-disallowed",
            RejectReason::AllQueuesFull => "all-queues-full",
            RejectReason::RegistryUnavailable => "registry-unavailable",
            RejectReason::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Rejection {
    pub fn reason(&self) -> RejectReason {
        match self {
            Rejection::Malformed(_) => RejectReason::Malformed,
            Rejection::UnknownDomain(_) => RejectReason::UnknownDomain,
            Rejection::RobotsDisallowed(_) => RejectReason::RobotsDisallowed,
            Rejection::AllQueuesFull(_) => RejectReason::AllQueuesFull,
            Rejection::RegistryUnavailable(_) => RejectReason::RegistryUnavailable,
            Rejection::Aborted(_) => RejectReason::Aborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_mapping() {
        assert_eq!(
            Rejection::Malformed(UrlError::Empty).reason(),
            RejectReason::Malformed
        );
        assert_eq!(
            Rejection::UnknownDomain("x.example".into()).reason(),
            RejectReason::UnknownDomain
        );
        assert_eq!(RejectReason::AllQueuesFull.to_string(), "all-queues-full");
    }

    #[test]
    fn test_rejection_display() {
        let rejection = Rejection::RobotsDisallowed("https://a.example/private".into());
        assert_eq!(
            rejection.to_string(),
            "Disallowed by robots.txt: https://a.example/private"
        );
    }
}
