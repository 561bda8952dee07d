/*
 * Responsibility
 * - tenants テーブル向け SQLx 操作 (ドメイン名 → テナント ID)
 * - RLS の対象外 (テナント確定前に走るため、pool から直接読む)
 */
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::RepoError;

#[derive(Debug, FromRow)]
pub struct TenantRow {
    #[sqlx(rename = "id")]
    pub tenant_id: Uuid,
    pub domain_name: String,
}

pub async fn find_active_by_domain_name(
    db: &PgPool,
    domain_name: &str,
) -> Result<Option<TenantRow>, RepoError> {
    let row = sqlx::query_as::<_, TenantRow>(
        r#"
        SELECT id, domain_name
        FROM tenants
        WHERE domain_name = $1
          AND is_active
        "#,
    )
    .bind(domain_name)
    .fetch_optional(db)
    .await?;

    Ok(row)
}
