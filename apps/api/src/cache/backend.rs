//! Durable substrate for the response cache.
//!
//! Layout: a single JSON object `key -> {"data", "timestamp", "ttl"}` with
//! timestamps and TTLs in milliseconds.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub data: Value,
    pub timestamp: i64,
    pub ttl: i64,
}

pub type PersistedMap = BTreeMap<String, PersistedEntry>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed cache file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not replace cache file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn read_all(&self) -> Result<PersistedMap, BackendError>;
    async fn write_all(&self, entries: &PersistedMap) -> Result<(), BackendError>;
}

/// Stores the whole cache as one JSON file, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CacheBackend for JsonFileBackend {
    async fn read_all(&self) -> Result<PersistedMap, BackendError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(PersistedMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &PersistedMap) -> Result<(), BackendError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| BackendError::Io(std::io::Error::other(e)))?
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("nope.json"));
        assert!(backend.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read_uses_documented_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cache.json");
        let backend = JsonFileBackend::new(&path);

        let mut entries = PersistedMap::new();
        entries.insert(
            "story-ranking:abc".to_string(),
            PersistedEntry {
                data: json!({"ranked": []}),
                timestamp: 1_700_000_000_000,
                ttl: 60_000,
            },
        );
        backend.write_all(&entries).await.unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["story-ranking:abc"]["ttl"], 60_000);
        assert_eq!(raw["story-ranking:abc"]["timestamp"], 1_700_000_000_000_i64);
        assert!(raw["story-ranking:abc"]["data"].is_object());

        assert_eq!(backend.read_all().await.unwrap(), entries);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        let backend = JsonFileBackend::new(&path);
        assert!(matches!(
            backend.read_all().await,
            Err(BackendError::Json(_))
        ));
    }
}
