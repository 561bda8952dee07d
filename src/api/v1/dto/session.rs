/*
 * Responsibility
 * - /tenant, /me の response DTO
 * - token の中身は role まで。iat/nbf/exp は返さない
 */
use serde::Serialize;

use crate::services::auth::Role;

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub tenant_id: String,
    pub domain_name: String,
    // tenant id as seen by the database session (None when the backend has no session)
    pub session_tenant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: i64,
    pub tenant_id: String,
    pub domain_name: String,
    pub role: Role,
}
