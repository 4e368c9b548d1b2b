use std::path::Path;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::{error, warn};

use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Load `{ "username": ..., "password": ... }` from `path`. A missing or
/// malformed file disables the operator routes instead of failing startup.
pub fn load_admin_credentials(path: &Path) -> Option<AdminCredentials> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "internal admin auth file not found; internal routes disabled"
        );
        return None;
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            error!(?err, path = %path.display(), "failed to read internal admin auth file");
            return None;
        }
    };

    match serde_json::from_str::<AdminCredentials>(&raw) {
        Ok(creds) if !creds.username.is_empty() && !creds.password.is_empty() => Some(creds),
        Ok(_) => {
            error!(path = %path.display(), "internal admin auth file has empty credentials");
            None
        }
        Err(err) => {
            error!(?err, "failed to parse internal admin auth file");
            None
        }
    }
}

pub async fn require_internal_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(config) = state.admin.as_deref() else {
        error!("internal admin credentials are missing; internal routes disabled");
        return internal_error_response();
    };

    let Some((username, password)) = basic_credentials(&req) else {
        return unauthorized_response();
    };

    if username != config.username || password != config.password {
        warn!(username = %username, "rejected internal route credentials");
        return unauthorized_response();
    }

    next.run(req).await
}

fn basic_credentials(req: &Request) -> Option<(String, String)> {
    let header_str = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header_str.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(BASE64.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn unauthorized_response() -> Response {
    let mut res = Response::new(Body::from("unauthorized"));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"Internal\""),
    );
    res
}

fn internal_error_response() -> Response {
    let mut res = Response::new(Body::from("internal auth not configured"));
    *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    res
}
