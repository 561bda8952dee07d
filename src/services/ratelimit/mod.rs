pub mod limiter;
pub mod store;
pub mod valkey;

pub use limiter::{Admission, RateLimitConfig, RateLimitFailMode, RateLimiter, retry_after_seconds};
pub use store::{Limit, RateLimitDecision, RateStore, RateStoreError};
