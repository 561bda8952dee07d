//! Locate the bearer credential of a request.
use axum::http::{HeaderMap, header};

const AUTH_COOKIE: &str = "Authorization";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("missing credential")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
}

/// Where the token was found (for logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Header,
    Cookie,
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The header must split on whitespace into exactly a scheme and a credential,
/// with the scheme matching `bearer` case-insensitively. When the header is absent
/// and `cookie_fallback` is set, the raw value of the `Authorization` cookie is used.
pub fn extract_token(
    headers: &HeaderMap,
    cookie_fallback: bool,
) -> Result<(&str, CredentialSource), CredentialError> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value.to_str().map_err(|_| CredentialError::Malformed)?;
        return parse_bearer(value).map(|token| (token, CredentialSource::Header));
    }

    if cookie_fallback && let Some(token) = cookie_token(headers) {
        return Ok((token, CredentialSource::Cookie));
    }

    Err(CredentialError::Missing)
}

fn parse_bearer(value: &str) -> Result<&str, CredentialError> {
    let mut fields = value.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        (None, _, _) => Err(CredentialError::Missing),
        _ => Err(CredentialError::Malformed),
    }
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}
