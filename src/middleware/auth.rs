//! Authorization stage: bearer token → Claims in request extensions.
//!
//! Protected operations require a token; a missing header is a rejection, never an
//! anonymous pass. Public operations skip this stage entirely.
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{AppError, UnauthorizedReason};
use crate::middleware::context;
use crate::services::auth::{CredentialError, TokenError, extract_token};
use crate::state::AppState;

/// Whether the routes behind a pipeline need a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

impl Access {
    pub fn requires_token(&self) -> bool {
        matches!(self, Self::Protected)
    }
}

pub async fn authorize(
    State((state, access)): State<(AppState, Access)>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !access.requires_token() {
        return Ok(next.run(req).await);
    }

    let (token, source) = match extract_token(req.headers(), state.enable_cookie_token) {
        Ok(found) => found,
        Err(err) => {
            let reason = match err {
                CredentialError::Missing => UnauthorizedReason::MissingCredential,
                CredentialError::Malformed => UnauthorizedReason::MalformedCredential,
            };
            warn!(reason = reason.as_str(), "authorization rejected");
            return Err(AppError::unauthorized(reason));
        }
    };

    let claims = match state.tokens.verify(token) {
        Ok(claims) => claims,
        Err(err) => {
            let reason = match err {
                TokenError::TokenExpired => UnauthorizedReason::TokenExpired,
                TokenError::TokenNotYetValid => UnauthorizedReason::TokenNotYetValid,
                _ => UnauthorizedReason::InvalidToken,
            };
            warn!(
                reason = reason.as_str(),
                source = ?source,
                token = %fingerprint(token),
                "authorization rejected"
            );
            return Err(AppError::unauthorized(reason));
        }
    };

    // the host decides the tenant; a token for another tenant is not accepted here
    if let Some(tenant) = context::tenant(req.extensions())
        && tenant.tenant_id != claims.tenant_id
    {
        warn!(
            reason = UnauthorizedReason::TenantMismatch.as_str(),
            host_tenant = %tenant.tenant_id,
            token_tenant = %claims.tenant_id,
            user_id = claims.user_id,
            "authorization rejected"
        );
        return Err(AppError::unauthorized(UnauthorizedReason::TenantMismatch));
    }

    debug!(user_id = claims.user_id, tenant_id = %claims.tenant_id, "authorized");

    context::set_claims(req.extensions_mut(), claims);

    Ok(next.run(req).await)
}

/// Short SHA-256 prefix of a token, safe to log.
fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}
