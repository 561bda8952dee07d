/*
 * Responsibility
 * - パイプライン共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - 内部エラー (DB / cache / token) の詳細はクライアントに出さない
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::error::RepoError;
use crate::services::db::DbError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Why a request was refused at the authorization stage.
///
/// Only the machine code reaches the client; the variants exist so logs can tell
/// a missing header apart from a malformed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    MissingCredential,
    MalformedCredential,
    InvalidToken,
    TokenExpired,
    TokenNotYetValid,
    TenantMismatch,
}

impl UnauthorizedReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential | Self::MalformedCredential => "MISSING_CREDENTIAL",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::TokenNotYetValid => "TOKEN_NOT_YET_VALID",
            Self::TenantMismatch => "TENANT_MISMATCH",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing",
            Self::MalformedCredential => "malformed",
            Self::InvalidToken => "invalid",
            Self::TokenExpired => "expired",
            Self::TokenNotYetValid => "not_yet_valid",
            Self::TenantMismatch => "tenant_mismatch",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("tenant could not be resolved")]
    TenantUnresolved,
    #[error("unauthorized ({})", .0.as_str())]
    Unauthorized(UnauthorizedReason),
    #[error("rate limit store unavailable")]
    RateLimitUnavailable,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn unauthorized(reason: UnauthorizedReason) -> Self {
        Self::Unauthorized(reason)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TenantUnresolved => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimitUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::TenantUnresolved => ("TENANT_UNRESOLVED", "unknown tenant".to_string()),
            AppError::Unauthorized(reason) => (reason.code(), "unauthorized".to_string()),
            AppError::RateLimitUnavailable => (
                "SERVICE_UNAVAILABLE",
                "service temporarily unavailable".to_string(),
            ),
            AppError::Internal => (
                "INTERNAL_SERVER_ERROR",
                "internal server error".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Db(err) => {
                tracing::error!(error = %err, "repository query failed");
                AppError::Internal
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        tracing::error!(error = %e, "request transaction unusable");
        AppError::Internal
    }
}
