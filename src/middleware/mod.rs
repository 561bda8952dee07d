/*
 * Responsibility
 * - リクエスト処理パイプライン (tenant → rate limit → auth → isolation)
 * - HTTP 横断レイヤ (request id / trace / timeout / panic 境界)
 */
pub mod auth;
pub mod context;
pub mod http;
pub mod isolation;
pub mod pipeline;
pub mod rate_limit;
pub mod tenant;

pub use auth::Access;
