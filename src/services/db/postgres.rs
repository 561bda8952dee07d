use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::services::db::tx::{Database, DbError, DbTx};

#[derive(Clone, Debug)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> Result<Box<dyn DbTx>, DbError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::Begin(e.to_string()))?;

        Ok(Box::new(PgTx { tx }))
    }
}

/// Pooled Postgres transaction. Dropping it unfinished rolls back on the connection.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl DbTx for PgTx {
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError> {
        let result = sqlx::query(statement)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DbError::Exec(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn set_local(&mut self, name: &str, value: &str) -> Result<(), DbError> {
        // set_config(..., is_local => true) == SET LOCAL, but with bind parameters
        sqlx::query("SELECT set_config($1, $2, true)")
            .bind(name)
            .bind(value)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| DbError::Exec(e.to_string()))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let PgTx { tx } = *self;
        tx.commit()
            .await
            .map_err(|e| DbError::Commit(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        let PgTx { tx } = *self;
        tx.rollback()
            .await
            .map_err(|e| DbError::Rollback(e.to_string()))
    }

    fn pg_connection(&mut self) -> Option<&mut PgConnection> {
        Some(&mut *self.tx)
    }
}
