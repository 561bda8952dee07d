//! Request-scoped values shared between pipeline stages and handlers.
//!
//! Each value lives in request extensions under a private newtype, so only this
//! module can write them and nothing else can collide with them.
use axum::http::Extensions;

use crate::services::auth::Claims;
use crate::services::db::TxHandle;
use crate::services::tenant::TenantContext;

#[derive(Clone)]
struct TenantKey(TenantContext);

#[derive(Clone)]
struct ClaimsKey(Claims);

#[derive(Clone)]
struct TxKey(TxHandle);

pub fn tenant(extensions: &Extensions) -> Option<&TenantContext> {
    extensions.get::<TenantKey>().map(|k| &k.0)
}

pub fn claims(extensions: &Extensions) -> Option<&Claims> {
    extensions.get::<ClaimsKey>().map(|k| &k.0)
}

pub fn transaction(extensions: &Extensions) -> Option<&TxHandle> {
    extensions.get::<TxKey>().map(|k| &k.0)
}

pub(crate) fn set_tenant(extensions: &mut Extensions, tenant: TenantContext) {
    extensions.insert(TenantKey(tenant));
}

pub(crate) fn set_claims(extensions: &mut Extensions, claims: Claims) {
    extensions.insert(ClaimsKey(claims));
}

pub(crate) fn set_transaction(extensions: &mut Extensions, tx: TxHandle) {
    extensions.insert(TxKey(tx));
}
