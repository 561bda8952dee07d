use std::time::Duration;

use async_trait::async_trait;

use crate::services::cache::CacheError;

/// Quota handed to the counter store.
///
/// `rate` events are sustained per `period`; `burst` is how many may arrive at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub rate: u32,
    pub burst: u32,
    pub period: Duration,
}

/// Outcome of one admission check. Computed fresh per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    // Requests still admissible right now.
    pub remaining: u32,
    // Time until the key is back to a full quota.
    pub reset_after: Duration,
    // Time until the next request would be admitted; zero when allowed.
    pub retry_after: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RateStoreError {
    #[error("rate store unavailable: {0}")]
    Unavailable(#[from] CacheError),
    #[error("rate store timed out")]
    Timeout,
    #[error("rate store reply invalid: {0}")]
    InvalidReply(String),
}

/// Shared counter store performing an atomic check-and-increment per key.
///
/// The store is the single source of truth for counts; callers keep no local state.
#[async_trait]
pub trait RateStore: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    async fn allow(&self, key: &str, limit: Limit) -> Result<RateLimitDecision, RateStoreError>;
}
