//! Fixed stage order for tenant-scoped routes:
//! tenant → rate limit → authorization → isolation → handler.
//!
//! Any stage returning early ends the request; later stages never run.
use axum::{Router, middleware};
use tower::ServiceBuilder;

use crate::middleware::auth::{self, Access};
use crate::middleware::{isolation, rate_limit, tenant};
use crate::state::AppState;

/// Wrap every route of `router` with the full pipeline.
///
/// `route_layer` keeps unmatched paths as plain 404s without touching the
/// dispatcher, the limiter or the database.
///
/// ```ignore
/// let me = Router::new().route("/me", get(me::me));
/// let me = pipeline::apply(me, state.clone(), Access::Protected);
/// ```
pub fn apply(router: Router<AppState>, state: AppState, access: Access) -> Router<AppState> {
    // ServiceBuilder: first layer added is the outermost
    let stages = ServiceBuilder::new()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant::resolve_tenant,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::limit_rate,
        ))
        .layer(middleware::from_fn_with_state(
            (state.clone(), access),
            auth::authorize,
        ))
        .layer(middleware::from_fn_with_state(state, isolation::isolate));

    router.route_layer(stages)
}
