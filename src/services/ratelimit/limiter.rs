use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use tracing::warn;

use crate::services::ratelimit::store::{Limit, RateLimitDecision, RateStore, RateStoreError};

const DEFAULT_LIMITER_NAME: &str = "default";
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    // Limiter identifier (ex: "global", "login"); empty means "default".
    pub name: String,
    // Requests permitted per period.
    pub rate: u32,
    // Instantaneous allowance.
    pub burst: u32,
    pub period: Duration,
}

impl RateLimitConfig {
    pub fn limiter_name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_LIMITER_NAME
        } else {
            &self.name
        }
    }

    pub fn limit(&self) -> Limit {
        Limit {
            rate: self.rate,
            burst: self.burst,
            period: self.period,
        }
    }
}

/// What to do when the counter store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitFailMode {
    #[default]
    Open,
    Closed,
}

impl FromStr for RateLimitFailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown rate limit fail mode: {other}")),
        }
    }
}

impl fmt::Display for RateLimitFailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Verdict of the limiter for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    // The store answered.
    Decided(RateLimitDecision),
    // The store failed and the limiter is fail-open.
    FailedOpen,
    // The store failed and the limiter is fail-closed.
    FailedClosed,
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        match self {
            Self::Decided(d) => d.allowed,
            Self::FailedOpen => true,
            Self::FailedClosed => false,
        }
    }
}

/// Admission control backed by a shared counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateStore>,
    config: RateLimitConfig,
    fail_mode: RateLimitFailMode,
    store_timeout: Duration,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .field("fail_mode", &self.fail_mode)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateStore>,
        config: RateLimitConfig,
        fail_mode: RateLimitFailMode,
    ) -> Self {
        Self {
            store,
            config,
            fail_mode,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Store key: `ratelimit:<name>:<client>`.
    pub fn key(&self, client: &str) -> String {
        format!("ratelimit:{}:{}", self.config.limiter_name(), client)
    }

    /// Ask the store, surfacing its errors.
    pub async fn check(&self, client: &str) -> Result<RateLimitDecision, RateStoreError> {
        let key = self.key(client);
        tokio::time::timeout(self.store_timeout, self.store.allow(&key, self.config.limit()))
            .await
            .map_err(|_| RateStoreError::Timeout)?
    }

    /// Ask the store and apply the fail mode; never returns an error.
    pub async fn allow(&self, client: &str) -> Admission {
        match self.check(client).await {
            Ok(decision) => Admission::Decided(decision),
            Err(err) => {
                warn!(
                    error = %err,
                    backend = self.store.backend_name(),
                    limiter = self.config.limiter_name(),
                    fail_mode = %self.fail_mode,
                    reason = "store_unavailable",
                    "rate limit store failure"
                );
                match self.fail_mode {
                    RateLimitFailMode::Open => Admission::FailedOpen,
                    RateLimitFailMode::Closed => Admission::FailedClosed,
                }
            }
        }
    }
}

/// `Retry-After` value in whole seconds, at least 1.
pub fn retry_after_seconds(retry_after: Duration) -> u64 {
    retry_after.as_secs().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::services::cache::CacheError;

    // Replays a fixed answer and records the keys it was asked about.
    struct ScriptedStore {
        answer: Option<RateLimitDecision>,
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RateStore for ScriptedStore {
        fn backend_name(&self) -> &'static str {
            "scripted"
        }

        async fn allow(
            &self,
            key: &str,
            _limit: Limit,
        ) -> Result<RateLimitDecision, RateStoreError> {
            self.keys.lock().unwrap().push(key.to_string());
            self.answer.ok_or_else(|| {
                RateStoreError::Unavailable(CacheError::BackendConnection("refused".into()))
            })
        }
    }

    struct StalledStore;

    #[async_trait]
    impl RateStore for StalledStore {
        fn backend_name(&self) -> &'static str {
            "stalled"
        }

        async fn allow(
            &self,
            _key: &str,
            _limit: Limit,
        ) -> Result<RateLimitDecision, RateStoreError> {
            std::future::pending().await
        }
    }

    fn config(name: &str) -> RateLimitConfig {
        RateLimitConfig {
            name: name.to_string(),
            rate: 2,
            burst: 2,
            period: Duration::from_secs(60),
        }
    }

    fn denied() -> RateLimitDecision {
        RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_after: Duration::from_secs(60),
            retry_after: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn empty_name_falls_back_to_default() {
        let store = Arc::new(ScriptedStore {
            answer: Some(denied()),
            keys: Mutex::new(Vec::new()),
        });
        let limiter = RateLimiter::new(store.clone(), config(""), RateLimitFailMode::Open);

        limiter.allow("10.0.0.1").await;
        let named = RateLimiter::new(store.clone(), config("login"), RateLimitFailMode::Open);
        named.allow("10.0.0.1").await;

        let keys = store.keys.lock().unwrap().clone();
        assert_eq!(
            keys,
            vec!["ratelimit:default:10.0.0.1", "ratelimit:login:10.0.0.1"]
        );
    }

    #[tokio::test]
    async fn store_decision_is_passed_through() {
        let store = Arc::new(ScriptedStore {
            answer: Some(denied()),
            keys: Mutex::new(Vec::new()),
        });
        let limiter = RateLimiter::new(store, config("global"), RateLimitFailMode::Open);

        let admission = limiter.allow("10.0.0.1").await;
        assert_eq!(admission, Admission::Decided(denied()));
        assert!(!admission.is_allowed());
    }

    #[tokio::test]
    async fn unreachable_store_fails_open_by_default() {
        let store = Arc::new(ScriptedStore {
            answer: None,
            keys: Mutex::new(Vec::new()),
        });
        let limiter = RateLimiter::new(store, config("global"), RateLimitFailMode::default());

        assert!(limiter.check("10.0.0.1").await.is_err());
        let admission = limiter.allow("10.0.0.1").await;
        assert_eq!(admission, Admission::FailedOpen);
        assert!(admission.is_allowed());
    }

    #[tokio::test]
    async fn unreachable_store_fails_closed_when_configured() {
        let store = Arc::new(ScriptedStore {
            answer: None,
            keys: Mutex::new(Vec::new()),
        });
        let limiter = RateLimiter::new(store, config("global"), RateLimitFailMode::Closed);

        let admission = limiter.allow("10.0.0.1").await;
        assert_eq!(admission, Admission::FailedClosed);
        assert!(!admission.is_allowed());
    }

    #[tokio::test]
    async fn stalled_store_counts_as_unavailable() {
        let limiter = RateLimiter::new(
            Arc::new(StalledStore),
            config("global"),
            RateLimitFailMode::Open,
        )
        .with_store_timeout(Duration::from_millis(20));

        assert!(matches!(
            limiter.check("10.0.0.1").await,
            Err(RateStoreError::Timeout)
        ));
        assert_eq!(limiter.allow("10.0.0.1").await, Admission::FailedOpen);
    }

    #[test]
    fn retry_after_is_whole_seconds_with_floor_of_one() {
        assert_eq!(retry_after_seconds(Duration::ZERO), 1);
        assert_eq!(retry_after_seconds(Duration::from_millis(400)), 1);
        assert_eq!(retry_after_seconds(Duration::from_millis(2_900)), 2);
        assert_eq!(retry_after_seconds(Duration::from_secs(30)), 30);
    }

    #[test]
    fn fail_mode_parses_from_config_strings() {
        assert_eq!("open".parse(), Ok(RateLimitFailMode::Open));
        assert_eq!(" Closed ".parse(), Ok(RateLimitFailMode::Closed));
        assert!("maybe".parse::<RateLimitFailMode>().is_err());
    }
}
