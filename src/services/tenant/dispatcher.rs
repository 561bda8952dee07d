use async_trait::async_trait;
use thiserror::Error;

/// Tenant resolved for the current request.
///
/// Inserted into request extensions by the tenant stage and read by the
/// isolation stage and handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,
    pub tenant_domain_name: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no tenant mapped to domain `{0}`")]
    NotFound(String),
    #[error("tenant lookup failed: {0}")]
    Backend(String),
}

/// Maps a host label (`tenant-a` in `tenant-a.example.com`) to a tenant id.
///
/// Caching and retries are the implementation's business.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    async fn find_tenant_id_by_domain_name(&self, domain_name: &str)
    -> Result<String, DispatchError>;
}
