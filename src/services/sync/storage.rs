use std::collections::BTreeMap;
#[cfg(test)]
use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

pub(crate) const DEVICE_ID_KEY: &str = "deviceId";
pub(crate) const LAST_SYNC_KEY: &str = "lastSyncTime";
pub(crate) const HISTORY_KEY: &str = "syncHistory";
pub(crate) const BUNDLE_KEY: &str = "studyBundle";

#[derive(Debug, Error)]
pub(crate) enum StorageError {
    #[error("storage io failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stored value for `{key}` is invalid: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode value for `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Local key-value state of the sync agent.
#[async_trait]
pub(crate) trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

pub(crate) async fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StorageError::Decode { key: key.to_string(), source }),
        None => Ok(None),
    }
}

pub(crate) async fn save<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let encoded = serde_json::to_value(value)
        .map_err(|source| StorageError::Encode { key: key.to_string(), source })?;
    store.set(key, encoded).await
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// A JSON object on disk. Every write rewrites the file through a
/// temporary sibling and a rename.
#[derive(Debug)]
pub(crate) struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.display().to_string(), source }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(self.io_error(err)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        serde_json::from_slice(&raw).map_err(|source| StorageError::Decode {
            key: self.path.display().to_string(),
            source,
        })
    }

    async fn write_all(&self, values: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec_pretty(values).map_err(|source| StorageError::Encode {
            key: self.path.display().to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|err| self.io_error(err))?;
        }

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, encoded).await.map_err(|err| self.io_error(err))?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|err| self.io_error(err))
    }
}

#[async_trait]
impl KeyValueStore for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value);
        self.write_all(&values).await
    }
}
