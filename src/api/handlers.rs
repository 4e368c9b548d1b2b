use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde_json::json;
use tracing::{debug, error};

use crate::{
    api::types::{ValidateRequest, ValidateResponse},
    state::AppState,
    templates::render_login_page,
    validation::Outcome,
};

pub async fn home() -> Result<Html<String>, (StatusCode, String)> {
    render_login_page().map(Html).map_err(|err| {
        error!(?err, "login page rendering failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Login page unavailable".to_string())
    })
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /validate_user` with a `username` field, as a form or JSON body.
pub async fn validate_user(State(state): State<AppState>, req: Request) -> Response {
    let body = read_request(&state, req).await;

    match state.validator.validate_current(body.username.as_deref()).await {
        Ok(outcome) => (status_for(&outcome), Json(ValidateResponse::from(&outcome))).into_response(),
        Err(err) => {
            error!(error = %err, "validation aborted by store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ValidateResponse::store_error()),
            )
                .into_response()
        }
    }
}

pub fn status_for(outcome: &Outcome) -> StatusCode {
    match outcome {
        Outcome::GrantedNew { .. } | Outcome::GrantedMatch { .. } => StatusCode::OK,
        Outcome::DeniedConflict { .. } | Outcome::DeniedMismatch { .. } => StatusCode::FORBIDDEN,
        Outcome::ErrorMissingUsername => StatusCode::BAD_REQUEST,
        Outcome::ErrorFingerprintUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A body that can't be parsed is treated as one without a username.
async fn read_request(state: &AppState, req: Request) -> ValidateRequest {
    if is_json(req.headers()) {
        match Json::<ValidateRequest>::from_request(req, state).await {
            Ok(Json(body)) => body,
            Err(rejection) => {
                debug!(%rejection, "unparseable JSON body");
                ValidateRequest::default()
            }
        }
    } else {
        match Form::<ValidateRequest>::from_request(req, state).await {
            Ok(Form(body)) => body,
            Err(rejection) => {
                debug!(%rejection, "unparseable form body");
                ValidateRequest::default()
            }
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}
