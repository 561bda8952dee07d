#![allow(dead_code)]

//! In-memory doubles for the counter store, the tenant dispatcher and the
//! database, plus router/request helpers shared by the integration tests.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use chrono::TimeDelta;
use http_body_util::BodyExt;

use tenant_gate::middleware::{Access, http, pipeline};
use tenant_gate::services::auth::TokenService;
use tenant_gate::services::cache::CacheError;
use tenant_gate::services::db::{Database, DbError, DbTx};
use tenant_gate::services::ratelimit::{
    Limit, RateLimitConfig, RateLimitDecision, RateLimitFailMode, RateLimiter, RateStore,
    RateStoreError,
};
use tenant_gate::services::tenant::{DispatchError, Dispatcher};
use tenant_gate::state::AppState;

pub const SECRET: [u8; 32] = [7u8; 32];
pub const TENANT_A: &str = "3f1c7a52-8d0e-4c1b-9a57-0b6a2f4d9e11";
pub const TENANT_B: &str = "9b2e4d61-5a7f-4e3c-8d12-7c4f1e0a6b22";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

// ---- counter store ----

/// GCRA over a local map, same arithmetic as the Valkey script.
#[derive(Default)]
pub struct MemoryRateStore {
    tat: Mutex<HashMap<String, Duration>>,
    epoch: Mutex<Option<Instant>>,
}

impl MemoryRateStore {
    fn now(&self) -> Duration {
        let mut epoch = self.epoch.lock().unwrap();
        epoch.get_or_insert_with(Instant::now).elapsed()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn allow(&self, key: &str, limit: Limit) -> Result<RateLimitDecision, RateStoreError> {
        let now = self.now();
        let emission = limit.period / limit.rate;
        let burst_offset = emission * limit.burst;

        let mut tats = self.tat.lock().unwrap();
        let tat = tats.get(key).copied().unwrap_or(now).max(now);
        let new_tat = tat + emission;
        let allow_at = new_tat.saturating_sub(burst_offset);

        if allow_at > now {
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_after: tat - now,
                retry_after: allow_at - now,
            });
        }

        tats.insert(key.to_string(), new_tat);
        let headroom = burst_offset.saturating_sub(new_tat - now);
        Ok(RateLimitDecision {
            allowed: true,
            remaining: (headroom.as_nanos() / emission.as_nanos()) as u32,
            reset_after: new_tat - now,
            retry_after: Duration::ZERO,
        })
    }
}

/// Always unreachable.
pub struct FailingRateStore;

#[async_trait]
impl RateStore for FailingRateStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn allow(&self, _key: &str, _limit: Limit) -> Result<RateLimitDecision, RateStoreError> {
        Err(RateStoreError::Unavailable(CacheError::BackendConnection(
            "connection refused".to_string(),
        )))
    }
}

// ---- tenant dispatcher ----

pub struct MapDispatcher {
    tenants: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl MapDispatcher {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            tenants: pairs
                .iter()
                .map(|(label, id)| (label.to_string(), id.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dispatcher for MapDispatcher {
    async fn find_tenant_id_by_domain_name(
        &self,
        domain_name: &str,
    ) -> Result<String, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tenants
            .get(domain_name)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound(domain_name.to_string()))
    }
}

// ---- database ----

#[derive(Default)]
pub struct TxLog {
    pub begins: AtomicUsize,
    pub executes: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub bindings: Mutex<Vec<(String, String)>>,
}

impl TxLog {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn bindings(&self) -> Vec<(String, String)> {
        self.bindings.lock().unwrap().clone()
    }
}

/// Database whose transactions only count what happens to them.
#[derive(Default)]
pub struct RecordingDatabase {
    pub log: Arc<TxLog>,
    pub fail_bind: AtomicBool,
    pub fail_commit: AtomicBool,
}

#[async_trait]
impl Database for RecordingDatabase {
    async fn begin(&self) -> Result<Box<dyn DbTx>, DbError> {
        self.log.begins.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingTx {
            log: self.log.clone(),
            fail_bind: self.fail_bind.load(Ordering::SeqCst),
            fail_commit: self.fail_commit.load(Ordering::SeqCst),
        }))
    }
}

pub struct RecordingTx {
    log: Arc<TxLog>,
    fail_bind: bool,
    fail_commit: bool,
}

#[async_trait]
impl DbTx for RecordingTx {
    async fn execute(&mut self, _statement: &str) -> Result<u64, DbError> {
        self.log.executes.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }

    async fn set_local(&mut self, name: &str, value: &str) -> Result<(), DbError> {
        if self.fail_bind {
            return Err(DbError::Exec("permission denied to set parameter".into()));
        }
        self.log
            .bindings
            .lock()
            .unwrap()
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.log.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            return Err(DbError::Commit("connection reset".into()));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.log.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---- harness ----

pub struct Harness {
    pub state: AppState,
    pub db: Arc<RecordingDatabase>,
    pub tenants: Arc<MapDispatcher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryRateStore::default()), rate_limit(100, 100))
    }

    pub fn with_store(store: Arc<dyn RateStore>, config: RateLimitConfig) -> Self {
        Self::build(store, config, RateLimitFailMode::Open)
    }

    pub fn build(
        store: Arc<dyn RateStore>,
        config: RateLimitConfig,
        fail_mode: RateLimitFailMode,
    ) -> Self {
        let db = Arc::new(RecordingDatabase::default());
        let tenants = Arc::new(MapDispatcher::new(&[
            ("tenant-a", TENANT_A),
            ("tenant-b", TENANT_B),
        ]));
        let tokens = TokenService::new(&SECRET).expect("key");
        let limiter = RateLimiter::new(store, config, fail_mode);

        let state = AppState::new(
            tokens,
            limiter,
            tenants.clone() as Arc<dyn Dispatcher>,
            db.clone() as Arc<dyn Database>,
        );

        Self { state, db, tenants }
    }

    pub fn log(&self) -> &TxLog {
        &self.db.log
    }

    /// Token for `tenant_id`, valid for an hour.
    pub fn token(&self, tenant_id: &str) -> String {
        self.state
            .tokens
            .issue(42, tenant_id, "admin", TimeDelta::hours(1))
            .expect("issue")
    }

    /// The application router (`/health`, `/api/v1/...`) with the global layers.
    pub fn app(&self) -> Router {
        tenant_gate::app::router(self.state.clone(), REQUEST_TIMEOUT)
    }

    /// Custom routes behind the pipeline and the global layers.
    pub fn serve(&self, routes: Router<AppState>, access: Access) -> Router {
        http::apply(self.pipeline_only(routes, access), REQUEST_TIMEOUT)
    }

    /// Custom routes behind the pipeline only (no panic boundary, no timeout).
    pub fn pipeline_only(&self, routes: Router<AppState>, access: Access) -> Router {
        pipeline::apply(routes, self.state.clone(), access).with_state(self.state.clone())
    }
}

pub fn rate_limit(rate: u32, burst: u32) -> RateLimitConfig {
    RateLimitConfig {
        name: "test".to_string(),
        rate,
        burst,
        period: Duration::from_secs(60),
    }
}

pub fn get(host: &str, path: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("GET")
        .uri(path)
        .header(header::HOST, host)
        .header("x-real-ip", "203.0.113.9")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn empty(builder: axum::http::request::Builder) -> Request<Body> {
    builder.body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll until `cond` holds; spawned rollbacks run on the test runtime.
pub async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
