/*
 * Responsibility
 * - GET /api/v1/tenant (public)
 * - host から解決した tenant と、DB session 側に bind された tenant id を返す
 */
use axum::{Json, extract::State};

use crate::{
    api::v1::dto::session::TenantResponse,
    api::v1::extractors::{Tenant, TenantTx},
    error::AppError,
    repos::session_repo,
    state::AppState,
};

pub async fn current_tenant(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
    TenantTx(tx): TenantTx,
) -> Result<Json<TenantResponse>, AppError> {
    let mut guard = tx.lock().await?;

    let session_tenant_id = match guard.pg_connection() {
        Some(conn) => session_repo::current_setting(conn, &state.rls_tenant_setting).await?,
        None => None,
    };

    Ok(Json(TenantResponse {
        tenant_id: tenant.tenant_id,
        domain_name: tenant.tenant_domain_name,
        session_tenant_id,
    }))
}
