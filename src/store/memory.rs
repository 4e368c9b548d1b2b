use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use super::{BindingBackend, StoreError};
use crate::model::Bindings;

const MEMORY_PATH: &str = ":memory:";

/// In-process backend. Counts loads and can be told to fail, which is what
/// the tests need; nothing here survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    bindings: Mutex<Bindings>,
    loads: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings(bindings: Bindings) -> Self {
        Self {
            bindings: Mutex::new(bindings),
            ..Self::default()
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn injected(kind: std::io::ErrorKind) -> std::io::Error {
        std::io::Error::new(kind, "injected failure")
    }
}

#[async_trait]
impl BindingBackend for MemoryBackend {
    async fn load(&self) -> Result<Bindings, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Read {
                path: PathBuf::from(MEMORY_PATH),
                source: Self::injected(std::io::ErrorKind::PermissionDenied),
            });
        }
        let guard = self.bindings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    async fn save(&self, bindings: &Bindings) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                path: PathBuf::from(MEMORY_PATH),
                source: Self::injected(std::io::ErrorKind::Other),
            });
        }
        let mut guard = self.bindings.lock().unwrap_or_else(|e| e.into_inner());
        *guard = bindings.clone();
        Ok(())
    }
}
