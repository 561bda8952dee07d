//! Rate limit stage.
//!
//! Clients are keyed by `X-Real-IP`, then the first `X-Forwarded-For` entry, then
//! the transport peer address. Whenever the store answers, the response carries
//! `X-RateLimit-Limit/Remaining/Reset`; a denial adds `Retry-After` and a 429 body
//! without calling the rest of the pipeline.
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::services::ratelimit::{Admission, RateLimitDecision, retry_after_seconds};
use crate::state::AppState;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Serialize)]
struct TooManyRequestsBody {
    title: &'static str,
    status: u16,
    detail: &'static str,
    message: String,
}

pub async fn limit_rate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client = client_identifier(
        req.headers(),
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
    );

    let decision = match state.limiter.allow(&client).await {
        Admission::Decided(decision) => decision,
        // already logged by the limiter
        Admission::FailedOpen => return next.run(req).await,
        Admission::FailedClosed => return AppError::RateLimitUnavailable.into_response(),
    };

    let limit = state.limiter.config().rate;

    if !decision.allowed {
        let retry_after = retry_after_seconds(decision.retry_after);
        warn!(
            client = %client,
            limiter = state.limiter.config().limiter_name(),
            retry_after,
            "rate limit exceeded"
        );

        let mut response = too_many_requests(retry_after);
        set_rate_limit_headers(response.headers_mut(), limit, &decision);
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    debug!(client = %client, remaining = decision.remaining, "rate limit ok");

    let mut response = next.run(req).await;
    set_rate_limit_headers(response.headers_mut(), limit, &decision);
    response
}

/// Client key for rate limiting.
pub fn client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(real_ip) = header_value(X_REAL_IP) {
        return real_ip.to_string();
    }

    if let Some(first) = header_value(X_FORWARDED_FOR)
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn set_rate_limit_headers(headers: &mut HeaderMap, limit: u32, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(reset_epoch_seconds(decision.reset_after)),
    );
}

fn reset_epoch_seconds(reset_after: Duration) -> i64 {
    let reset_ms = i64::try_from(reset_after.as_millis()).unwrap_or(i64::MAX / 2);
    (Utc::now().timestamp_millis() + reset_ms) / 1000
}

fn too_many_requests(retry_after: u64) -> Response {
    let body = TooManyRequestsBody {
        title: "Too Many Requests",
        status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
        detail: "API request limit exceeded. Please try again later.",
        message: format!("Rate limit exceeded. Retry after {retry_after} seconds."),
    };

    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
}
