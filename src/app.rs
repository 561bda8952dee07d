/*
 * Responsibility
 * - Config読み込み → 依存生成 (TokenService / Valkey / PgPool / Dispatcher) → Router 組み立て
 * - Middleware の適用 (http 共通層 + tenant pipeline)
 * - axum::serve() で起動 (ConnectInfo 付き, ctrl-c で graceful shutdown)
 */
use std::net::SocketAddr;
use std::{panic, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware::http;
use crate::services::auth::TokenService;
use crate::services::cache::ValkeyClient;
use crate::services::db::PgDatabase;
use crate::services::ratelimit::RateLimiter;
use crate::services::tenant::{CachedDispatcher, Dispatcher, PgTenantDirectory};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,tenant_gate=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook() {
    let default_hook = panic::take_hook();

    // The hook runs before unwinding, so the isolation stage still gets to roll back.
    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");
        default_hook(info);
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook();

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(?config, "loaded configuration");

    let state = build_state(&config).await?;
    let app = router(state, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let tokens = TokenService::from_hex(&config.token_secret_hex).context("TOKEN_SECRET_HEX")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to postgres")?;

    let valkey = ValkeyClient::new(&config.redis_url)
        .await
        .context("connect to valkey")?;

    let limiter = RateLimiter::new(
        Arc::new(valkey.clone()),
        config.rate_limit.clone(),
        config.rate_limit_fail_mode,
    );

    let directory = PgTenantDirectory::new(pool.clone());
    let tenants: Arc<dyn Dispatcher> = if config.tenant_cache_ttl_seconds > 0 {
        Arc::new(CachedDispatcher::new(
            directory,
            valkey,
            Duration::from_secs(config.tenant_cache_ttl_seconds),
        ))
    } else {
        Arc::new(directory)
    };

    let state = AppState::new(tokens, limiter, tenants, Arc::new(PgDatabase::new(pool)))
        .with_cookie_token(config.enable_cookie_token)
        .with_rls_tenant_setting(&config.rls_tenant_setting);

    Ok(state)
}

/// Full application router: `/health` plus the tenant-scoped `/api/v1`.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .route("/health", get(api::v1::handlers::health::health))
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    http::apply(router, request_timeout)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
