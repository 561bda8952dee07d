pub mod cached;
pub mod directory;
pub mod dispatcher;
pub mod host;

pub use cached::CachedDispatcher;
pub use directory::PgTenantDirectory;
pub use dispatcher::{DispatchError, Dispatcher, TenantContext};
pub use host::{effective_host, tenant_label};
