use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("begin failed: {0}")]
    Begin(String),
    #[error("statement failed: {0}")]
    Exec(String),
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("rollback failed: {0}")]
    Rollback(String),
    #[error("transaction already finalized")]
    Finalized,
}

/// Source of request-scoped transactions (a connection pool in production).
#[async_trait]
pub trait Database: Send + Sync + 'static {
    async fn begin(&self) -> Result<Box<dyn DbTx>, DbError>;
}

/// One open transaction.
///
/// `commit` and `rollback` consume the transaction, so it can be finalized once.
#[async_trait]
pub trait DbTx: Send + 'static {
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError>;

    /// Set a configuration parameter for the rest of this transaction only
    /// (`SET LOCAL` semantics). The value is passed as a bound parameter.
    async fn set_local(&mut self, name: &str, value: &str) -> Result<(), DbError>;

    async fn commit(self: Box<Self>) -> Result<(), DbError>;

    async fn rollback(self: Box<Self>) -> Result<(), DbError>;

    /// Raw connection for handlers issuing their own queries.
    fn pg_connection(&mut self) -> Option<&mut sqlx::PgConnection> {
        None
    }
}
