/*
 * Responsibility
 * - 環境変数や設定の読み込み (DATABASE_URL, REDIS_URL, TOKEN_SECRET_HEX, rate limit など)
 * - 設定値のバリデーション (不足なら起動失敗)
 * - 秘密鍵のデフォルト値は持たない
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::ratelimit::{RateLimitConfig, RateLimitFailMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,

    // 32 bytes, hex encoded. Key material: never printed.
    pub token_secret_hex: String,
    pub enable_cookie_token: bool,

    pub rate_limit: RateLimitConfig,
    pub rate_limit_fail_mode: RateLimitFailMode,

    pub rls_tenant_setting: String,
    pub tenant_cache_ttl_seconds: u64,

    pub request_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("database_max_connections", &self.database_max_connections)
            .field("enable_cookie_token", &self.enable_cookie_token)
            .field("rate_limit", &self.rate_limit)
            .field("rate_limit_fail_mode", &self.rate_limit_fail_mode)
            .field("rls_tenant_setting", &self.rls_tenant_setting)
            .field("tenant_cache_ttl_seconds", &self.tenant_cache_ttl_seconds)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;

        let redis_url =
            std::env::var("REDIS_URL").map_err(|_| ConfigError::Missing("REDIS_URL"))?;

        let token_secret_hex = std::env::var("TOKEN_SECRET_HEX")
            .map_err(|_| ConfigError::Missing("TOKEN_SECRET_HEX"))?
            .trim()
            .to_string();
        if token_secret_hex.len() != 64 {
            return Err(ConfigError::Invalid("TOKEN_SECRET_HEX"));
        }

        let enable_cookie_token = parse_bool_or("ENABLE_COOKIE_TOKEN", false)?;

        let rate_limit = RateLimitConfig {
            name: std::env::var("RATE_LIMIT_NAME").unwrap_or_else(|_| "global".to_string()),
            rate: parse_or("RATE_LIMIT_RATE", 100)?,
            burst: parse_or("RATE_LIMIT_BURST", 100)?,
            period: Duration::from_secs(parse_or("RATE_LIMIT_PERIOD_SECONDS", 60)?),
        };
        if rate_limit.rate == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_RATE"));
        }
        if rate_limit.period.is_zero() {
            return Err(ConfigError::Invalid("RATE_LIMIT_PERIOD_SECONDS"));
        }

        let rate_limit_fail_mode = match std::env::var("RATE_LIMIT_FAIL_MODE") {
            Ok(v) => v
                .parse::<RateLimitFailMode>()
                .map_err(|_| ConfigError::Invalid("RATE_LIMIT_FAIL_MODE"))?,
            Err(_) => RateLimitFailMode::Open,
        };

        let rls_tenant_setting = std::env::var("RLS_TENANT_SETTING")
            .unwrap_or_else(|_| "app.current_tenant_id".to_string());
        if !is_valid_setting_name(&rls_tenant_setting) {
            return Err(ConfigError::Invalid("RLS_TENANT_SETTING"));
        }

        let tenant_cache_ttl_seconds = parse_or("TENANT_CACHE_TTL_SECONDS", 300)?;

        let request_timeout = Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECONDS", 30)?);

        Ok(Self {
            addr,
            app_env,
            database_url,
            database_max_connections,
            redis_url,
            token_secret_hex,
            enable_cookie_token,
            rate_limit,
            rate_limit_fail_mode,
            rls_tenant_setting,
            tenant_cache_ttl_seconds,
            request_timeout,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn parse_bool_or(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(key)),
        },
        Err(_) => Ok(default),
    }
}

/// Postgres custom settings must look like `prefix.name`.
pub fn is_valid_setting_name(name: &str) -> bool {
    let mut parts = name.split('.');
    let (Some(prefix), Some(rest), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    [prefix, rest].iter().all(|p| {
        !p.is_empty()
            && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !p.starts_with(|c: char| c.is_ascii_digit())
    })
}
