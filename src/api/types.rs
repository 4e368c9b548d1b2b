use serde::{Deserialize, Serialize};

use crate::validation::Outcome;

pub const STORE_ERROR_CODE: &str = "store_error";
pub const STORE_ERROR_MESSAGE: &str = "Unable to access the device registry.";

#[derive(Debug, Default, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub username: Option<String>,
}

/// Grants carry `message`, denials and errors carry `error`.
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Outcome> for ValidateResponse {
    fn from(outcome: &Outcome) -> Self {
        let text = outcome.message();
        let (message, error) = if outcome.is_granted() {
            (Some(text), None)
        } else {
            (None, Some(text))
        };
        Self {
            outcome: outcome.code().as_str(),
            message,
            error,
        }
    }
}

impl ValidateResponse {
    pub fn store_error() -> Self {
        Self {
            outcome: STORE_ERROR_CODE,
            message: None,
            error: Some(STORE_ERROR_MESSAGE.to_string()),
        }
    }
}
