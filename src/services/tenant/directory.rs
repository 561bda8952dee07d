use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error};

use crate::repos::tenant_repo;
use crate::services::tenant::dispatcher::{DispatchError, Dispatcher};

/// Tenant lookup against the `tenants` table.
#[derive(Clone, Debug)]
pub struct PgTenantDirectory {
    db: PgPool,
}

impl PgTenantDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Dispatcher for PgTenantDirectory {
    async fn find_tenant_id_by_domain_name(
        &self,
        domain_name: &str,
    ) -> Result<String, DispatchError> {
        let row = tenant_repo::find_active_by_domain_name(&self.db, domain_name)
            .await
            .map_err(|e| {
                error!(domain = domain_name, error = ?e, "tenant lookup failed");
                DispatchError::Backend("tenant lookup failed".to_string())
            })?;

        let tenant = row.ok_or_else(|| DispatchError::NotFound(domain_name.to_string()))?;
        debug!(domain = %tenant.domain_name, tenant_id = %tenant.tenant_id, "tenant found");

        Ok(tenant.tenant_id.to_string())
    }
}
