use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::warn;
use uuid::Uuid;

use super::{BindingBackend, StoreError};
use crate::model::Bindings;

/// Bindings persisted as a flat UTF-8 JSON object.
///
/// Writes go to a temp file next to the target, are synced, then renamed
/// over it, so readers only ever see a complete document. On unix the
/// parent directory is synced after the rename so the new entry survives
/// a crash.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("bindings.json");
        self.path
            .with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    #[cfg(unix)]
    async fn sync_parent_dir(&self) -> std::io::Result<()> {
        File::open(self.parent_dir()).await?.sync_all().await
    }

    #[cfg(not(unix))]
    async fn sync_parent_dir(&self) -> std::io::Result<()> {
        Ok(())
    }

    async fn write_temp(&self, tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl BindingBackend for JsonFileBackend {
    async fn load(&self) -> Result<Bindings, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Bindings::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, bindings: &Bindings) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(bindings)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        let tmp = self.temp_path();
        if let Err(err) = self.write_temp(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.write_error(err));
        }

        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            warn!(path = %self.path.display(), ?err, "rename of binding store failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.write_error(err));
        }

        self.sync_parent_dir()
            .await
            .map_err(|e| self.write_error(e))?;

        Ok(())
    }
}
