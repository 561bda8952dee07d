pub mod error;
pub mod tenant_repo;
pub mod session_repo;
