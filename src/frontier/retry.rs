//! Retry bookkeeping for downstream fetch failures
//!
//! `RetryPolicy` decides whether (and when) a failed URL may come back;
//! `RetrySet` holds the survivors ordered by the time they become ready.

use crate::config::{RetryConfig, RetryPolicyKind};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

/// A failed fetch reported back by the fetching side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRecord {
    pub url: Url,

    /// Failed attempts so far, including the one being reported
    pub retry_count: u32,

    pub last_attempt: DateTime<Utc>,

    pub http_status: Option<u16>,
}

impl RetryRecord {
    pub fn new(url: Url, retry_count: u32) -> Self {
        Self {
            url,
            retry_count,
            last_attempt: Utc::now(),
            http_status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_last_attempt(mut self, at: DateTime<Utc>) -> Self {
        self.last_attempt = at;
        self
    }
}

/// Why a retry record could not be read from text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryRecordError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid URL '{0}'")]
    Url(String),

    #[error("invalid retry count '{0}'")]
    Count(String),

    #[error("invalid RFC 3339 timestamp '{0}'")]
    Timestamp(String),

    #[error("invalid HTTP status '{0}'")]
    Status(String),

    #[error("unexpected field '{0}'")]
    Trailing(String),
}

/// Reads `<url> <retry_count> <last_attempt> [http_status]`
///
/// `last_attempt` is RFC 3339, e.g.
/// `https://a.example/x 2 2024-05-01T12:00:00Z 503`.
impl FromStr for RetryRecord {
    type Err = RetryRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();

        let raw = fields.next().ok_or(RetryRecordError::Missing("URL"))?;
        let url = Url::parse(raw).map_err(|_| RetryRecordError::Url(raw.to_string()))?;

        let raw = fields
            .next()
            .ok_or(RetryRecordError::Missing("retry count"))?;
        let retry_count = raw
            .parse::<u32>()
            .map_err(|_| RetryRecordError::Count(raw.to_string()))?;

        let raw = fields
            .next()
            .ok_or(RetryRecordError::Missing("last attempt time"))?;
        let last_attempt = DateTime::parse_from_rfc3339(raw)
            .map_err(|_| RetryRecordError::Timestamp(raw.to_string()))?
            .with_timezone(&Utc);

        let mut record = RetryRecord::new(url, retry_count).with_last_attempt(last_attempt);

        if let Some(raw) = fields.next() {
            let status = raw
                .parse::<u16>()
                .map_err(|_| RetryRecordError::Status(raw.to_string()))?;
            record = record.with_status(status);
        }

        if let Some(extra) = fields.next() {
            return Err(RetryRecordError::Trailing(extra.to_string()));
        }

        Ok(record)
    }
}

/// Retry eligibility rule
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    kind: RetryPolicyKind,
    max_retries: u32,
    cooldown: Duration,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            kind: config.policy,
            max_retries: config.max_retries,
            cooldown: Duration::seconds(config.cooldown_secs as i64),
        }
    }

    /// When a failed URL may be re-admitted
    ///
    /// # Returns
    ///
    /// * `Some(time)` - Earliest re-admission time
    /// * `None` - The URL is past the retry ceiling and is dropped
    pub fn ready_at(&self, record: &RetryRecord) -> Option<DateTime<Utc>> {
        match self.kind {
            RetryPolicyKind::Cooldown => {
                if record.retry_count > self.max_retries {
                    None
                } else {
                    Some(record.last_attempt + self.cooldown)
                }
            }
            RetryPolicyKind::Sweep => Some(record.last_attempt),
        }
    }

    pub fn kind(&self) -> RetryPolicyKind {
        self.kind
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    ready_at: DateTime<Utc>,
    generation: u64,
    key: String,
}

#[derive(Debug, Default)]
struct RetryState {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    /// URL -> (generation of its live heap entry, parsed URL)
    pending: HashMap<String, (u64, Url)>,
    next_generation: u64,
}

/// URLs waiting to be re-admitted, earliest ready time first
///
/// A URL is held at most once; adding it again replaces its ready time.
#[derive(Debug, Default)]
pub struct RetrySet {
    state: Mutex<RetryState>,
}

impl RetrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a URL until `ready_at`
    pub fn add_retry(&self, url: Url, ready_at: DateTime<Utc>) {
        let mut state = self.state.lock();
        let generation = state.next_generation;
        state.next_generation += 1;

        let key = url.as_str().to_string();
        state.pending.insert(key.clone(), (generation, url));
        state.heap.push(Reverse(HeapEntry {
            ready_at,
            generation,
            key,
        }));
    }

    /// Removes and returns the earliest URL whose ready time has passed
    pub fn next_retry_ready(&self, now: DateTime<Utc>) -> Option<Url> {
        let mut state = self.state.lock();

        while let Some(Reverse(head)) = state.heap.peek() {
            let live = state
                .pending
                .get(&head.key)
                .is_some_and(|(generation, _)| *generation == head.generation);

            if live && head.ready_at > now {
                return None;
            }

            let Some(Reverse(head)) = state.heap.pop() else {
                break;
            };
            if live {
                return state.pending.remove(&head.key).map(|(_, url)| url);
            }
        }

        None
    }

    /// Number of distinct URLs waiting
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }
}
