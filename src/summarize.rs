//! Boundary to the external note summarization service.
//!
//! The store only hands over the ordered, trimmed, non-empty note texts and
//! passes back whatever the collaborator returns. Retrying belongs to the
//! collaborator side: wrap a [`Summarizer`] in [`RetryingSummarizer`] to get
//! bounded exponential backoff on transient failures.

use crate::model::Query;
use std::fmt;
use std::time::Duration;

/// Typed failure reported by a summarizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryError {
    /// Service down or unreachable.
    Unavailable(String),
    /// Quota or rate limit hit.
    RateLimited(String),
    /// The service rejected the request as malformed.
    InvalidRequest(String),
    /// Credentials missing or rejected.
    Unauthorized(String),
}

impl SummaryError {
    /// Whether a later attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SummaryError::Unavailable(_) | SummaryError::RateLimited(_))
    }
}

impl fmt::Display for SummaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryError::Unavailable(msg) => write!(f, "summarizer unavailable: {}", msg),
            SummaryError::RateLimited(msg) => write!(f, "summarizer rate limited: {}", msg),
            SummaryError::InvalidRequest(msg) => write!(f, "invalid summary request: {}", msg),
            SummaryError::Unauthorized(msg) => write!(f, "summarizer unauthorized: {}", msg),
        }
    }
}

impl std::error::Error for SummaryError {}

/// Turns an ordered list of notes into one summary string.
#[allow(async_fn_in_trait)]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, notes: &[String]) -> Result<String, SummaryError>;
}

/// Retry ceiling and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = no retry).
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each following one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2_u32.pow(attempt.saturating_sub(1))
    }
}

/// Wraps a summarizer with bounded exponential backoff.
///
/// Only `Unavailable` and `RateLimited` are retried; other failures surface
/// immediately.
#[derive(Debug, Clone)]
pub struct RetryingSummarizer<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Summarizer> RetryingSummarizer<S> {
    pub fn new(inner: S) -> Self {
        RetryingSummarizer {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Summarizer> Summarizer for RetryingSummarizer<S> {
    async fn summarize(&self, notes: &[String]) -> Result<String, SummaryError> {
        let mut attempts = 0;
        let max_attempts = self.policy.max_retries + 1; // +1 for initial attempt

        loop {
            attempts += 1;

            match self.inner.summarize(notes).await {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    if !e.is_retryable() || attempts >= max_attempts {
                        return Err(e);
                    }

                    let delay = self.policy.delay(attempts);
                    debug!(
                        "Summary failed (attempt {}/{}): {}, retrying in {:?}",
                        attempts, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Trimmed, non-empty note texts of a query in list order.
pub fn note_texts(query: &Query) -> Vec<String> {
    query
        .notes
        .iter()
        .map(|n| n.text.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
