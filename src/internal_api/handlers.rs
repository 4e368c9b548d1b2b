use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use tracing::error;

use crate::state::AppState;

pub async fn list_bindings(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let bindings = state.validator.store().snapshot().await.map_err(|e| {
        error!(error = %e, "failed to load bindings for listing");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let entries = bindings.iter().collect::<Vec<_>>();
    Ok(Json(json!({
        "count": entries.len(),
        "bindings": entries,
        "generated_ts": chrono::Utc::now().timestamp(),
    })))
}
