/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - tokens / limiter / tenants (dispatcher) / db
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 * - 実装は trait object で受けるので、テストでは in-memory 実装に差し替える
 */
use std::sync::Arc;

use crate::services::auth::TokenService;
use crate::services::db::Database;
use crate::services::ratelimit::RateLimiter;
use crate::services::tenant::Dispatcher;

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub limiter: Arc<RateLimiter>,
    pub tenants: Arc<dyn Dispatcher>,
    pub db: Arc<dyn Database>,
    // accept `Cookie: Authorization=<token>` when the header is absent
    pub enable_cookie_token: bool,
    // session variable read by the row security policies
    pub rls_tenant_setting: Arc<str>,
}

impl AppState {
    pub fn new(
        tokens: TokenService,
        limiter: RateLimiter,
        tenants: Arc<dyn Dispatcher>,
        db: Arc<dyn Database>,
    ) -> Self {
        Self {
            tokens: Arc::new(tokens),
            limiter: Arc::new(limiter),
            tenants,
            db,
            enable_cookie_token: false,
            rls_tenant_setting: Arc::from("app.current_tenant_id"),
        }
    }

    pub fn with_cookie_token(mut self, enabled: bool) -> Self {
        self.enable_cookie_token = enabled;
        self
    }

    pub fn with_rls_tenant_setting(mut self, name: &str) -> Self {
        self.rls_tenant_setting = Arc::from(name);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("limiter", &self.limiter)
            .field("enable_cookie_token", &self.enable_cookie_token)
            .field("rls_tenant_setting", &self.rls_tenant_setting)
            .finish_non_exhaustive()
    }
}
