/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - public (/tenant) と protected (/me) を分けて pipeline を掛け、merge する
 * - route_layer なので 404 は pipeline を通らない
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{me::me, tenant::current_tenant};
use crate::middleware::{Access, pipeline};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/tenant", get(current_tenant));
    let public = pipeline::apply(public, state.clone(), Access::Public);

    let protected = Router::new().route("/me", get(me));
    let protected = pipeline::apply(protected, state, Access::Protected);

    public.merge(protected)
}
