use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_STORE_PATH: &str = "user_data.json";
pub const DEFAULT_ADMIN_AUTH_FILE: &str = "internal_admin_auth.json";
pub const DEFAULT_FINGERPRINT_TIMEOUT_MS: u64 = 5_000;

/// Runtime settings.
///
/// Read with `dotenvy::var`, so a `.env` next to the binary works the same
/// as exported variables:
/// - `DEVICELOCK_BIND_ADDR`
/// - `DEVICELOCK_STORE_PATH`
/// - `DEVICELOCK_FINGERPRINT_TIMEOUT_MS`
/// - `DEVICELOCK_FINGERPRINT` (pins the fingerprint instead of asking the OS)
/// - `DEVICELOCK_ADMIN_AUTH_FILE`
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub store_path: PathBuf,
    pub fingerprint_timeout: Duration,
    pub fingerprint_override: Option<String>,
    pub admin_auth_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            fingerprint_timeout: Duration::from_millis(DEFAULT_FINGERPRINT_TIMEOUT_MS),
            fingerprint_override: None,
            admin_auth_file: PathBuf::from(DEFAULT_ADMIN_AUTH_FILE),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let fingerprint_timeout = match get("DEVICELOCK_FINGERPRINT_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("DEVICELOCK_FINGERPRINT_TIMEOUT_MS={raw:?} is not a number"))?;
                Duration::from_millis(ms)
            }
            None => defaults.fingerprint_timeout,
        };

        Ok(Self {
            bind_addr: get("DEVICELOCK_BIND_ADDR").unwrap_or(defaults.bind_addr),
            store_path: get("DEVICELOCK_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            fingerprint_timeout,
            fingerprint_override: get("DEVICELOCK_FINGERPRINT"),
            admin_auth_file: get("DEVICELOCK_ADMIN_AUTH_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.admin_auth_file),
        })
    }
}
