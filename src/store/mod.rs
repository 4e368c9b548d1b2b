//! Durable username → fingerprint mapping.
//!
//! [`BindingStore`] is the only thing that touches the persisted document.
//! Every operation takes the store's lock, loads the whole document, and
//! (for writes) saves the whole document back before releasing the lock,
//! so a [`StoreSession`] can run a read-then-write sequence without another
//! request slipping in between.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::model::Bindings;

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileBackend;
pub use memory::MemoryBackend;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read binding store {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("binding store {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write binding store {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode bindings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where the full binding document lives.
#[async_trait]
pub trait BindingBackend: Send + Sync {
    /// Load the full document. A document that does not exist yet is empty;
    /// one that cannot be read or parsed is an error.
    async fn load(&self) -> Result<Bindings, StoreError>;

    /// Replace the full document. Must be durable when it returns `Ok`.
    async fn save(&self, bindings: &Bindings) -> Result<(), StoreError>;
}

pub struct BindingStore {
    backend: Arc<dyn BindingBackend>,
    gate: Mutex<()>,
}

impl BindingStore {
    pub fn new(backend: Arc<dyn BindingBackend>) -> Self {
        Self {
            backend,
            gate: Mutex::new(()),
        }
    }

    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(JsonFileBackend::new(path)))
    }

    /// Lock the store and load the current document. The lock is held until
    /// the returned session is dropped.
    pub async fn session(&self) -> Result<StoreSession<'_>, StoreError> {
        let guard = self.gate.lock().await;
        let bindings = self.backend.load().await?;
        Ok(StoreSession {
            _guard: guard,
            backend: self.backend.as_ref(),
            bindings,
        })
    }

    pub async fn get(&self, username: &str) -> Result<Option<String>, StoreError> {
        let session = self.session().await?;
        Ok(session.get(username).map(str::to_string))
    }

    pub async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<String>, StoreError> {
        let session = self.session().await?;
        Ok(session.find_by_fingerprint(fingerprint).map(str::to_string))
    }

    pub async fn set(&self, username: &str, fingerprint: &str) -> Result<(), StoreError> {
        let mut session = self.session().await?;
        session.set(username, fingerprint).await
    }

    pub async fn snapshot(&self) -> Result<Bindings, StoreError> {
        let session = self.session().await?;
        Ok(session.bindings)
    }
}

/// Exclusive view of the store for the lifetime of the value.
pub struct StoreSession<'a> {
    _guard: MutexGuard<'a, ()>,
    backend: &'a dyn BindingBackend,
    bindings: Bindings,
}

impl StoreSession<'_> {
    pub fn get(&self, username: &str) -> Option<&str> {
        self.bindings.get(username)
    }

    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<&str> {
        self.bindings.find_by_fingerprint(fingerprint)
    }

    /// Upsert and persist. The in-memory view only changes once the
    /// backend has accepted the write.
    pub async fn set(&mut self, username: &str, fingerprint: &str) -> Result<(), StoreError> {
        let mut next = self.bindings.clone();
        next.insert(username, fingerprint);
        self.backend.save(&next).await?;
        self.bindings = next;
        debug!(username, total = self.bindings.len(), "binding persisted");
        Ok(())
    }
}
