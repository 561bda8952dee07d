//! Bearer token issuance and verification.
//!
//! Tokens are compact JWE (`dir` + `A256GCM`) over a typed claims payload, so the
//! payload is both confidential and tamper-evident under a single 32-byte key.
use chrono::{TimeDelta, Utc};
use josekit::jwe::{self, Dir, JweHeader};
use josekit::jwe::alg::direct::{DirectJweDecrypter, DirectJweEncrypter};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Required symmetric key length (A256GCM).
pub const KEY_LEN: usize = 32;

const CONTENT_ENCRYPTION: &str = "A256GCM";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },
    #[error("invalid key encoding")]
    InvalidKeyEncoding,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("token not yet valid")]
    TokenNotYetValid,
    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// Role carried by a token: either a numeric role id or a role name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Role {
    Id(i64),
    Name(String),
}

impl From<i64> for Role {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Authenticated payload of a token.
///
/// Every field is required at decode time; a missing or wrong-typed field makes
/// the whole token invalid. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub tenant_id: String,
    pub role: Role,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "nbf")]
    pub not_before: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// Issues and verifies tokens with one immutable key.
///
/// Holds no mutable state after construction; share it behind an `Arc`.
pub struct TokenService {
    encrypter: DirectJweEncrypter,
    decrypter: DirectJweDecrypter,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenService")
            .field("enc", &CONTENT_ENCRYPTION)
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.len() != KEY_LEN {
            return Err(TokenError::InvalidKeySize {
                expected: KEY_LEN,
                actual: secret.len(),
            });
        }

        let encrypter = Dir
            .encrypter_from_bytes(secret)
            .map_err(|_| TokenError::InvalidKeyEncoding)?;
        let decrypter = Dir
            .decrypter_from_bytes(secret)
            .map_err(|_| TokenError::InvalidKeyEncoding)?;

        Ok(Self {
            encrypter,
            decrypter,
        })
    }

    /// Build from a 64-character hex string (32 bytes).
    pub fn from_hex(secret_hex: &str) -> Result<Self, TokenError> {
        let bytes = hex::decode(secret_hex.trim()).map_err(|_| TokenError::InvalidKeyEncoding)?;
        Self::new(&bytes)
    }

    pub fn issue(
        &self,
        user_id: i64,
        tenant_id: &str,
        role: impl Into<Role>,
        ttl: TimeDelta,
    ) -> Result<String, TokenError> {
        self.issue_at(user_id, tenant_id, role, ttl, Utc::now().timestamp())
    }

    /// Issue with an explicit clock (unix seconds).
    pub fn issue_at(
        &self,
        user_id: i64,
        tenant_id: &str,
        role: impl Into<Role>,
        ttl: TimeDelta,
        now: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            user_id,
            tenant_id: tenant_id.to_string(),
            role: role.into(),
            issued_at: now,
            not_before: now,
            expires_at: now.saturating_add(whole_seconds_up(ttl)),
        };

        let payload =
            serde_json::to_vec(&claims).map_err(|e| TokenError::Encode(e.to_string()))?;

        let mut header = JweHeader::new();
        header.set_token_type("JWT");
        header.set_content_encryption(CONTENT_ENCRYPTION);

        jwe::serialize_compact(&payload, &header, &self.encrypter)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify with an explicit clock (unix seconds).
    ///
    /// Valid iff the integrity check passes and `not_before <= now < expires_at`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let (payload, _header) = jwe::deserialize_compact(token, &self.decrypter).map_err(|e| {
            debug!(error = %e, "token decryption failed");
            TokenError::InvalidToken
        })?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|e| {
            debug!(error = %e, "token payload decode failed");
            TokenError::InvalidToken
        })?;

        if claims.tenant_id.trim().is_empty() {
            return Err(TokenError::InvalidToken);
        }
        if now >= claims.expires_at {
            return Err(TokenError::TokenExpired);
        }
        if now < claims.not_before {
            return Err(TokenError::TokenNotYetValid);
        }

        Ok(claims)
    }
}

/// Whole seconds of `ttl`, rounding a positive fractional part up.
fn whole_seconds_up(ttl: TimeDelta) -> i64 {
    let secs = ttl.num_seconds();
    if ttl.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
