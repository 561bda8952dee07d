/*
 * Responsibility
 * - middleware が extensions に格納済みである前提で取り出す
 * - 見つからない場合は pipeline 未設定: Tenant は 400, Authenticated は 401, TenantTx は 500
 */
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::{AppError, UnauthorizedReason};
use crate::middleware::context;
use crate::services::auth::Claims;
use crate::services::db::TxHandle;
use crate::services::tenant::TenantContext;

/// Tenant resolved from the request host.
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantContext);

/// Claims of a verified token. Only present behind `Access::Protected`.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

/// The request transaction, already bound to the tenant.
///
/// Commit and rollback belong to the isolation stage; handlers only run statements.
#[derive(Debug, Clone)]
pub struct TenantTx(pub TxHandle);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context::tenant(&parts.extensions)
            .cloned()
            .map(Tenant)
            .ok_or(AppError::TenantUnresolved)
    }
}

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context::claims(&parts.extensions)
            .cloned()
            .map(Authenticated)
            .ok_or(AppError::unauthorized(
                UnauthorizedReason::MissingCredential,
            ))
    }
}

impl<S> FromRequestParts<S> for TenantTx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        context::transaction(&parts.extensions)
            .cloned()
            .map(TenantTx)
            .ok_or_else(|| {
                tracing::error!("no request transaction; isolation stage not applied");
                AppError::Internal
            })
    }
}
