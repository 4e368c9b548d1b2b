use axum::{middleware, routing::get, Router};

use crate::state::AppState;

pub mod auth;
pub mod handlers;

use auth::require_internal_auth;
use handlers::list_bindings;

/// Operator routes. Read-only; every route sits behind basic auth.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/internal/bindings", get(list_bindings))
        .route_layer(middleware::from_fn_with_state(state, require_internal_auth))
}
