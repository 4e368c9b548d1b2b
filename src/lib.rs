pub mod api;
pub mod config;
pub mod fingerprint;
pub mod internal_api;
pub mod model;
pub mod state;
pub mod store;
pub mod templates;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use config::Config;
use fingerprint::{provider_from_config, FingerprintProvider};
use internal_api::auth::load_admin_credentials;
use state::AppState;
use store::BindingStore;
use validation::ValidationService;

/// Wire the store, provider and admin credentials described by `config`.
pub fn build_state(config: &Config) -> AppState {
    let store = Arc::new(BindingStore::json_file(&config.store_path));
    let provider: Arc<dyn FingerprintProvider> = Arc::from(provider_from_config(config));

    AppState {
        validator: ValidationService::new(store, provider),
        admin: load_admin_credentials(&config.admin_auth_file).map(Arc::new),
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(api::router())
        .merge(internal_api::router(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}
