//! Tenant resolution: host → tenant label → tenant id (via the dispatcher).
//!
//! Runs first. On success a `TenantContext` is attached to the request; on any
//! failure the request ends here with 400 and no later stage runs.
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use crate::error::AppError;
use crate::middleware::context;
use crate::services::tenant::{DispatchError, TenantContext, effective_host, tenant_label};
use crate::state::AppState;

pub async fn resolve_tenant(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let host = effective_host(req.headers(), req.uri());
    let Some(label) = host.and_then(tenant_label) else {
        warn!(host = ?host, reason = "tenant_unresolved", "no usable host on request");
        return Err(AppError::TenantUnresolved);
    };

    let tenant_id = match state.tenants.find_tenant_id_by_domain_name(&label).await {
        Ok(id) => id,
        Err(DispatchError::NotFound(_)) => {
            warn!(domain = %label, reason = "tenant_unresolved", "unmapped tenant");
            return Err(AppError::TenantUnresolved);
        }
        Err(err) => {
            error!(domain = %label, error = %err, reason = "tenant_unresolved", "tenant dispatcher failed");
            return Err(AppError::TenantUnresolved);
        }
    };

    debug!(domain = %label, tenant_id = %tenant_id, "resolved tenant");

    context::set_tenant(
        req.extensions_mut(),
        TenantContext {
            tenant_id,
            tenant_domain_name: label,
        },
    );

    Ok(next.run(req).await)
}
