/*
 * Responsibility
 * - request transaction 上の session 設定の読み出し
 * - 書き込み (set_config) は services::db 側 (isolation stage 専用)
 */
use sqlx::PgConnection;

use crate::repos::error::RepoError;

/// `current_setting(name, missing_ok => true)`; unset and empty both map to `None`.
pub async fn current_setting(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<String>, RepoError> {
    let value: Option<String> = sqlx::query_scalar("SELECT current_setting($1, true)")
        .bind(name)
        .fetch_one(conn)
        .await?;

    Ok(value.filter(|v| !v.is_empty()))
}
