/*
 * Responsibility
 * - repo が上位に伝える意味の定義
 * - 生の sqlx::Error はクライアントに出さない (AppError::Internal に潰す)
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
}
