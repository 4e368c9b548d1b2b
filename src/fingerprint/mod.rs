//! Host fingerprints.
//!
//! The validation protocol only ever sees a string or a
//! [`FingerprintError`]; how the string is produced is up to the provider.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

pub mod command;

pub use command::CommandFingerprint;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },
    #[error("fingerprint source returned no data")]
    Empty,
    #[error("fingerprint source did not answer within {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait FingerprintProvider: Send + Sync {
    async fn current_fingerprint(&self) -> Result<String, FingerprintError>;
}

/// Always reports the same value. Used when the fingerprint is pinned in
/// configuration, and by tests.
#[derive(Debug, Clone)]
pub struct StaticFingerprint(String);

impl StaticFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

#[async_trait]
impl FingerprintProvider for StaticFingerprint {
    async fn current_fingerprint(&self) -> Result<String, FingerprintError> {
        if self.0.trim().is_empty() {
            return Err(FingerprintError::Empty);
        }
        Ok(self.0.clone())
    }
}

pub fn provider_from_config(config: &Config) -> Box<dyn FingerprintProvider> {
    match config.fingerprint_override.as_deref() {
        Some(pinned) => Box::new(StaticFingerprint::new(pinned)),
        None => Box::new(CommandFingerprint::for_host(config.fingerprint_timeout)),
    }
}

/// Short prefix for log lines; fingerprints are not logged whole.
pub fn redact(fingerprint: &str) -> String {
    let prefix: String = fingerprint.chars().take(6).collect();
    if prefix.len() < fingerprint.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}
