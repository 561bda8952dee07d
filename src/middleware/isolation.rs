//! Isolation stage: one transaction per request, bound to the request's tenant.
//!
//! The tenant id is bound with a transaction-local setting before the handler runs,
//! so every statement issued through the request transaction is filtered by the
//! row security policies reading that setting. The transaction is finalized exactly
//! once: rollback on panic, on an error status or when the request is dropped,
//! commit otherwise.
use std::panic::AssertUnwindSafe;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::error::AppError;
use crate::middleware::context;
use crate::services::db::{DbTx, TxHandle};
use crate::state::AppState;

pub async fn isolate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(tenant_id) = context::tenant(req.extensions()).map(|t| t.tenant_id.clone()) else {
        warn!(reason = "tenant_unresolved", "no tenant for request transaction");
        return Err(AppError::TenantUnresolved);
    };

    let mut tx = state.db.begin().await.map_err(|err| {
        error!(error = %err, tenant_id = %tenant_id, "begin transaction failed");
        AppError::Internal
    })?;

    if let Err(err) = tx.set_local(&state.rls_tenant_setting, &tenant_id).await {
        error!(error = %err, tenant_id = %tenant_id, "binding tenant to transaction failed");
        rollback(tx, "bind_failed").await;
        return Err(AppError::Internal);
    }

    let handle = TxHandle::new(tx, &tenant_id);
    context::set_transaction(req.extensions_mut(), handle.clone());

    let mut guard = RollbackOnDrop::arm(handle.clone());
    let outcome = AssertUnwindSafe(next.run(req)).catch_unwind().await;
    let tx = handle.take().await;
    guard.disarm();

    let Some(tx) = tx else {
        error!(tenant_id = %tenant_id, "request transaction finalized outside the isolation stage");
        return Err(AppError::Internal);
    };

    let response = match outcome {
        Ok(response) => response,
        Err(panic) => {
            rollback(tx, "panic").await;
            std::panic::resume_unwind(panic);
        }
    };

    let status = response.status();
    if status.as_u16() >= 400 {
        debug!(status = status.as_u16(), "handler failed; rolling back");
        rollback(tx, "error_status").await;
        return Ok(response);
    }

    if let Err(err) = tx.commit().await {
        error!(error = %err, tenant_id = %tenant_id, "commit failed");
        return Err(AppError::Internal);
    }

    debug!(tenant_id = %tenant_id, "transaction committed");
    Ok(response)
}

async fn rollback(tx: Box<dyn DbTx>, cause: &'static str) {
    if let Err(err) = tx.rollback().await {
        error!(error = %err, cause, "rollback failed");
    }
}

/// Rolls back the request transaction if the request future is dropped while the
/// transaction is still open (client gone, timeout).
struct RollbackOnDrop {
    handle: Option<TxHandle>,
}

impl RollbackOnDrop {
    fn arm(handle: TxHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for RollbackOnDrop {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Some(tx) = handle.take().await {
                        warn!(tenant_id = handle.tenant_id(), "request dropped with open transaction");
                        rollback(tx, "cancelled").await;
                    }
                });
            }
            Err(_) => {
                warn!(
                    tenant_id = handle.tenant_id(),
                    "no runtime available; transaction released without explicit rollback"
                );
            }
        }
    }
}
