use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::services::db::tx::{DbError, DbTx};

/// Exclusive access to the request transaction.
///
/// Only handed out by [`TxHandle::lock`] while the slot still holds a transaction.
pub struct TxGuard<'a>(MutexGuard<'a, Option<Box<dyn DbTx>>>);

impl Deref for TxGuard<'_> {
    type Target = dyn DbTx;

    fn deref(&self) -> &Self::Target {
        match self.0.as_deref() {
            Some(tx) => tx,
            None => unreachable!("TxGuard over an empty slot"),
        }
    }
}

impl DerefMut for TxGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.0.as_deref_mut() {
            Some(tx) => tx,
            None => unreachable!("TxGuard over an empty slot"),
        }
    }
}

/// Request-scoped handle to the transaction opened by the isolation stage.
///
/// Cloned into request extensions; the isolation stage keeps one clone and is the
/// only place that finalizes the transaction. Once finalized, `lock` fails.
#[derive(Clone)]
pub struct TxHandle {
    slot: Arc<Mutex<Option<Box<dyn DbTx>>>>,
    tenant_id: Arc<str>,
}

impl std::fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxHandle")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl TxHandle {
    pub fn new(tx: Box<dyn DbTx>, tenant_id: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(tx))),
            tenant_id: Arc::from(tenant_id),
        }
    }

    /// Tenant this transaction is bound to.
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub async fn lock(&self) -> Result<TxGuard<'_>, DbError> {
        let guard = self.slot.lock().await;
        if guard.is_none() {
            return Err(DbError::Finalized);
        }
        Ok(TxGuard(guard))
    }

    /// Remove the transaction for finalization. Returns `None` the second time.
    pub(crate) async fn take(&self) -> Option<Box<dyn DbTx>> {
        self.slot.lock().await.take()
    }
}
