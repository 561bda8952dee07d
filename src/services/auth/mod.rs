pub mod credential;
pub mod token_service;

pub use credential::{CredentialError, CredentialSource, extract_token};
pub use token_service::{Claims, Role, TokenError, TokenService};
