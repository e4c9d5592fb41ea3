use std::fmt;

use anyhow::Result;
use serde_json::Value;

use crate::traits::GenerateError;

/// The actual HTTP client for GitHub/Slack is an external collaborator —
/// this crate owns the transform from API response to `Event`, not the
/// transport. Adapters take a `Box<dyn Fetcher>` so tests exercise the
/// transform against canned JSON without a network.
pub trait Fetcher: Send {
    /// Fetch one page of activity since `since`, returning the raw JSON
    /// array the provider's API would return and an optional continuation
    /// token for pagination. A rate-limited response should fail with a
    /// [`RateLimitError`] wrapped in the returned `anyhow::Error` so callers
    /// can classify it via [`classify_fetch_error`].
    fn fetch(&mut self, resource: &str, since: Option<&str>) -> Result<Value>;
}

/// Fetcher that always returns an empty page; used where no real client is
/// configured so a source safely no-ops instead of erroring.
pub struct NullFetcher;

impl Fetcher for NullFetcher {
    fn fetch(&mut self, _resource: &str, _since: Option<&str>) -> Result<Value> {
        Ok(Value::Array(Vec::new()))
    }
}

/// Signals an HTTP 429 / `Retry-After` response. A `Fetcher` implementation
/// backed by a real HTTP client returns this (via `anyhow::Error::from`)
/// instead of a generic transport error so it survives the trip through
/// `anyhow` and can be downcast back out by [`classify_fetch_error`].
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after_ms: u64,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rate limited, retry after {}ms", self.retry_after_ms)
    }
}

impl std::error::Error for RateLimitError {}

/// Turns a `Fetcher::fetch` failure into a [`GenerateError`]: a
/// [`RateLimitError`] becomes `GenerateError::RateLimited` carrying its
/// delay, everything else is treated as a transient, retryable failure.
pub fn classify_fetch_error(err: anyhow::Error) -> GenerateError {
    match err.downcast_ref::<RateLimitError>() {
        Some(rate_limit) => GenerateError::RateLimited {
            retry_after_ms: rate_limit.retry_after_ms,
            source: err,
        },
        None => GenerateError::Retryable(err),
    }
}
