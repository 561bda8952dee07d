/*
 * Responsibility
 * - GET /health (疎通用)
 * - tenant pipeline の外に置く (host / token / DB に依存しない)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}
