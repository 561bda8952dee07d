/*
 * Responsibility
 * - GET /api/v1/me (protected)
 * - token の claims と host の tenant を返す (auth stage で一致確認済み)
 */
use axum::Json;

use crate::api::v1::{
    dto::session::MeResponse,
    extractors::{Authenticated, Tenant},
};

pub async fn me(Tenant(tenant): Tenant, Authenticated(claims): Authenticated) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: claims.user_id,
        tenant_id: tenant.tenant_id,
        domain_name: tenant.tenant_domain_name,
        role: claims.role,
    })
}
