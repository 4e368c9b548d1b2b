//! Grant/deny decisions for a username presented from the current device.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    fingerprint::{redact, FingerprintError, FingerprintProvider},
    store::{BindingStore, StoreError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// First time this username was seen; the device is now bound to it.
    GrantedNew { username: String },
    GrantedMatch { username: String },
    /// The device already belongs to `registered_to`.
    DeniedConflict {
        username: String,
        registered_to: String,
    },
    /// The username is bound to a different device.
    DeniedMismatch { username: String },
    ErrorMissingUsername,
    ErrorFingerprintUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCode {
    GrantedNew,
    GrantedMatch,
    DeniedConflict,
    DeniedMismatch,
    ErrorMissingUsername,
    ErrorFingerprintUnavailable,
}

impl OutcomeCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCode::GrantedNew => "granted_new",
            OutcomeCode::GrantedMatch => "granted_match",
            OutcomeCode::DeniedConflict => "denied_conflict",
            OutcomeCode::DeniedMismatch => "denied_mismatch",
            OutcomeCode::ErrorMissingUsername => "error_missing_username",
            OutcomeCode::ErrorFingerprintUnavailable => "error_fingerprint_unavailable",
        }
    }
}

impl Outcome {
    pub fn code(&self) -> OutcomeCode {
        match self {
            Outcome::GrantedNew { .. } => OutcomeCode::GrantedNew,
            Outcome::GrantedMatch { .. } => OutcomeCode::GrantedMatch,
            Outcome::DeniedConflict { .. } => OutcomeCode::DeniedConflict,
            Outcome::DeniedMismatch { .. } => OutcomeCode::DeniedMismatch,
            Outcome::ErrorMissingUsername => OutcomeCode::ErrorMissingUsername,
            Outcome::ErrorFingerprintUnavailable => OutcomeCode::ErrorFingerprintUnavailable,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Outcome::GrantedNew { .. } | Outcome::GrantedMatch { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Outcome::GrantedNew { username } => {
                format!("New user {username}. Unique ID has been stored.")
            }
            Outcome::GrantedMatch { username } => {
                format!("Access granted for {username}. Unique ID matches.")
            }
            Outcome::DeniedConflict { registered_to, .. } => format!(
                "Access denied. This device is already registered with another user: {registered_to}."
            ),
            Outcome::DeniedMismatch { username } => {
                format!("Access denied for {username}. Please use your registered device.")
            }
            Outcome::ErrorMissingUsername => "Username is required.".to_string(),
            Outcome::ErrorFingerprintUnavailable => {
                "Unable to retrieve current unique ID.".to_string()
            }
        }
    }
}

#[derive(Clone)]
pub struct ValidationService {
    store: Arc<BindingStore>,
    provider: Arc<dyn FingerprintProvider>,
}

impl ValidationService {
    pub fn new(store: Arc<BindingStore>, provider: Arc<dyn FingerprintProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &Arc<BindingStore> {
        &self.store
    }

    /// Ask the provider for the current fingerprint and validate against it.
    /// A missing username is rejected before the provider is called.
    pub async fn validate_current(&self, username: Option<&str>) -> Result<Outcome, StoreError> {
        if normalize_username(username).is_none() {
            return Ok(self.finish(None, Outcome::ErrorMissingUsername));
        }
        let fingerprint = self.provider.current_fingerprint().await;
        self.validate(username, fingerprint).await
    }

    /// Decide for `username` given the result of a fingerprint lookup.
    ///
    /// Order matters: a device already bound to someone else is denied
    /// before the requested username's own record is consulted, so a
    /// brand-new username can never claim a registered device.
    pub async fn validate(
        &self,
        username: Option<&str>,
        fingerprint: Result<String, FingerprintError>,
    ) -> Result<Outcome, StoreError> {
        let Some(username) = normalize_username(username) else {
            return Ok(self.finish(None, Outcome::ErrorMissingUsername));
        };

        let fingerprint = match fingerprint {
            Ok(fp) if !fp.trim().is_empty() => fp,
            Ok(_) => {
                warn!(username, "fingerprint provider returned an empty value");
                return Ok(self.finish(Some(username), Outcome::ErrorFingerprintUnavailable));
            }
            Err(err) => {
                warn!(username, error = %err, "fingerprint unavailable");
                return Ok(self.finish(Some(username), Outcome::ErrorFingerprintUnavailable));
            }
        };

        let mut session = self.store.session().await.map_err(|err| {
            error!(username, error = %err, "binding store unreadable");
            err
        })?;

        if let Some(owner) = session.find_by_fingerprint(&fingerprint) {
            if owner != username {
                let registered_to = owner.to_string();
                return Ok(self.finish(Some(username), Outcome::DeniedConflict {
                    username: username.to_string(),
                    registered_to,
                }));
            }
        }

        let outcome = match session.get(username) {
            None => {
                session.set(username, &fingerprint).await.map_err(|err| {
                    error!(username, error = %err, "failed to persist new binding");
                    err
                })?;
                Outcome::GrantedNew {
                    username: username.to_string(),
                }
            }
            Some(stored) if stored == fingerprint => Outcome::GrantedMatch {
                username: username.to_string(),
            },
            Some(_) => Outcome::DeniedMismatch {
                username: username.to_string(),
            },
        };

        info!(
            username,
            fingerprint = %redact(&fingerprint),
            outcome = outcome.code().as_str(),
            "validated"
        );
        Ok(outcome)
    }

    fn finish(&self, username: Option<&str>, outcome: Outcome) -> Outcome {
        info!(
            username = username.unwrap_or_default(),
            outcome = outcome.code().as_str(),
            "validated"
        );
        outcome
    }
}

fn normalize_username(username: Option<&str>) -> Option<&str> {
    username.filter(|u| !u.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        fingerprint::StaticFingerprint,
        model::Bindings,
        store::MemoryBackend,
    };

    fn service_with(backend: Arc<MemoryBackend>) -> ValidationService {
        ValidationService::new(
            Arc::new(BindingStore::new(backend)),
            Arc::new(StaticFingerprint::new("HW-1")),
        )
    }

    fn fp(value: &str) -> Result<String, FingerprintError> {
        Ok(value.to_string())
    }

    async fn stored(svc: &ValidationService) -> Bindings {
        svc.store().snapshot().await.unwrap()
    }

    #[tokio::test]
    async fn walkthrough_alice_then_bob() {
        let svc = service_with(Arc::new(MemoryBackend::new()));

        let out = svc.validate(Some("alice"), fp("HW-1")).await.unwrap();
        assert_eq!(out.code(), OutcomeCode::GrantedNew);
        assert_eq!(stored(&svc).await.get("alice"), Some("HW-1"));

        let out = svc.validate(Some("bob"), fp("HW-1")).await.unwrap();
        assert_eq!(
            out,
            Outcome::DeniedConflict {
                username: "bob".into(),
                registered_to: "alice".into()
            }
        );
        assert!(out.message().contains("alice"));

        let out = svc.validate(Some("alice"), fp("HW-1")).await.unwrap();
        assert_eq!(out.code(), OutcomeCode::GrantedMatch);

        let out = svc.validate(Some("alice"), fp("HW-2")).await.unwrap();
        assert_eq!(out.code(), OutcomeCode::DeniedMismatch);

        let snapshot = stored(&svc).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("alice"), Some("HW-1"));
    }

    #[tokio::test]
    async fn repeated_match_is_idempotent() {
        let svc = service_with(Arc::new(MemoryBackend::new()));
        svc.validate(Some("u"), fp("f")).await.unwrap();
        let before = stored(&svc).await;

        for _ in 0..5 {
            let out = svc.validate(Some("u"), fp("f")).await.unwrap();
            assert_eq!(out.code(), OutcomeCode::GrantedMatch);
        }
        assert_eq!(stored(&svc).await, before);
    }

    #[tokio::test]
    async fn conflict_never_binds_the_new_username() {
        let svc = service_with(Arc::new(MemoryBackend::new()));
        svc.validate(Some("u1"), fp("f")).await.unwrap();

        for other in ["u2", "u3", "U1"] {
            let out = svc.validate(Some(other), fp("f")).await.unwrap();
            assert_eq!(out.code(), OutcomeCode::DeniedConflict);
            assert_eq!(stored(&svc).await.get(other), None);
        }
    }

    #[tokio::test]
    async fn conflict_takes_precedence_over_own_mismatch() {
        let mut seed = Bindings::new();
        seed.insert("alice", "HW-1");
        seed.insert("bob", "HW-2");
        let svc = service_with(Arc::new(MemoryBackend::with_bindings(seed)));

        let out = svc.validate(Some("bob"), fp("HW-1")).await.unwrap();
        assert_eq!(out.code(), OutcomeCode::DeniedConflict);
    }

    #[tokio::test]
    async fn shared_fingerprint_denies_everyone_but_the_reported_owner() {
        // Hand-edited store with two owners of one device; ties resolve to
        // the smallest username.
        let seed: Bindings =
            serde_json::from_str(r#"{"carol":"HW-9","dave":"HW-9"}"#).unwrap();
        let svc = service_with(Arc::new(MemoryBackend::with_bindings(seed)));

        let out = svc.validate(Some("carol"), fp("HW-9")).await.unwrap();
        assert_eq!(out.code(), OutcomeCode::GrantedMatch);
        let out = svc.validate(Some("dave"), fp("HW-9")).await.unwrap();
        assert_eq!(out.code(), OutcomeCode::DeniedConflict);
    }

    #[tokio::test]
    async fn missing_username_never_reads_the_store() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service_with(backend.clone());

        for name in [None, Some(""), Some("   ")] {
            let out = svc.validate(name, fp("HW-1")).await.unwrap();
            assert_eq!(out, Outcome::ErrorMissingUsername);
            let out = svc.validate_current(name).await.unwrap();
            assert_eq!(out, Outcome::ErrorMissingUsername);
        }
        assert_eq!(backend.loads(), 0);
    }

    #[tokio::test]
    async fn unavailable_fingerprint_never_touches_the_store() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service_with(backend.clone());

        let out = svc
            .validate(Some("alice"), Err(FingerprintError::Empty))
            .await
            .unwrap();
        assert_eq!(out, Outcome::ErrorFingerprintUnavailable);
        let out = svc.validate(Some("alice"), fp("")).await.unwrap();
        assert_eq!(out, Outcome::ErrorFingerprintUnavailable);
        let out = svc.validate(Some("alice"), fp("   \n")).await.unwrap();
        assert_eq!(out, Outcome::ErrorFingerprintUnavailable);
        assert_eq!(backend.loads(), 0);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn conflict_decision_is_logged_with_username() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let svc = service_with(Arc::new(MemoryBackend::new()));
        svc.validate(Some("alice"), fp("HW-1")).await.unwrap();
        let out = svc.validate(Some("bob"), fp("HW-1")).await.unwrap();
        assert_eq!(out.code(), OutcomeCode::DeniedConflict);

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = text
            .lines()
            .find(|l| l.contains("denied_conflict"))
            .expect("conflict decision logged");
        assert!(line.contains("bob"), "{line}");
    }

    struct CountingProvider(AtomicUsize);

    #[async_trait]
    impl FingerprintProvider for CountingProvider {
        async fn current_fingerprint(&self) -> Result<String, FingerprintError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("HW-7".to_string())
        }
    }

    #[tokio::test]
    async fn validate_current_skips_provider_without_username() {
        let provider = Arc::new(CountingProvider(AtomicUsize::new(0)));
        let svc = ValidationService::new(
            Arc::new(BindingStore::new(Arc::new(MemoryBackend::new()))),
            provider.clone(),
        );

        svc.validate_current(Some("")).await.unwrap();
        assert_eq!(provider.0.load(Ordering::SeqCst), 0);

        let out = svc.validate_current(Some("erin")).await.unwrap();
        assert_eq!(out.code(), OutcomeCode::GrantedNew);
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
        assert_eq!(stored(&svc).await.get("erin"), Some("HW-7"));
    }

    #[tokio::test]
    async fn store_read_failure_is_surfaced() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service_with(backend.clone());
        backend.fail_reads(true);

        assert!(svc.validate(Some("alice"), fp("HW-1")).await.is_err());
    }

    #[tokio::test]
    async fn failed_first_binding_is_not_a_grant() {
        let backend = Arc::new(MemoryBackend::new());
        let svc = service_with(backend.clone());
        backend.fail_writes(true);

        assert!(svc.validate(Some("alice"), fp("HW-1")).await.is_err());
        backend.fail_writes(false);
        assert!(stored(&svc).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_bindings_are_not_lost() {
        let svc = service_with(Arc::new(MemoryBackend::new()));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let svc = svc.clone();
                tokio::spawn(async move {
                    svc.validate(Some(&format!("user-{i}")), Ok(format!("HW-{i}")))
                        .await
                })
            })
            .collect();

        for task in tasks {
            let out = task.await.unwrap().unwrap();
            assert_eq!(out.code(), OutcomeCode::GrantedNew);
        }
        assert_eq!(stored(&svc).await.len(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_on_one_device_bind_exactly_one_user() {
        let svc = service_with(Arc::new(MemoryBackend::new()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let svc = svc.clone();
                tokio::spawn(async move {
                    svc.validate(Some(&format!("user-{i}")), Ok("HW-shared".to_string()))
                        .await
                })
            })
            .collect();

        let mut granted = 0;
        for task in tasks {
            match task.await.unwrap().unwrap().code() {
                OutcomeCode::GrantedNew => granted += 1,
                OutcomeCode::DeniedConflict => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(granted, 1);
        assert_eq!(stored(&svc).await.len(), 1);
    }
}
