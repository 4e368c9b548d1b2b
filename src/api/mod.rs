use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod handlers;
pub mod types;

use handlers::{healthz, home, validate_user};

/// Public router: login page and the validation endpoint.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/validate_user", post(validate_user))
        .route("/healthz", get(healthz))
}
