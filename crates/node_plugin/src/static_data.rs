//! Durable per-node key/value storage owned by the host.
//!
//! A node never holds its bookkeeping itself: the host hands it a
//! [`StaticDataStore`] scoped to one node instance and the node reads, writes
//! and deletes keys through it.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StaticDataError {
    #[error("static data io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("static data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait StaticDataStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StaticDataError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StaticDataError>;
    async fn delete(&self, key: &str) -> Result<(), StaticDataError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryStaticData {
    map: Arc<DashMap<String, Value>>,
}

impl InMemoryStaticData {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[async_trait]
impl StaticDataStore for InMemoryStaticData {
    async fn get(&self, key: &str) -> Result<Option<Value>, StaticDataError> {
        Ok(self.map.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StaticDataError> {
        self.map.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StaticDataError> {
        self.map.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "InMemoryStaticData"
    }
}

/// Keeps one JSON object per node instance in a file.
///
/// Every call re-reads the file so that two processes sharing the path see
/// each other's writes between invocations.
#[derive(Debug)]
pub struct FileStaticData {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStaticData {
    pub fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(Self { path, lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn read_map(&self) -> Result<Map<String, Value>, StaticDataError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_map(&self, map: &Map<String, Value>) -> Result<(), StaticDataError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl StaticDataStore for FileStaticData {
    async fn get(&self, key: &str) -> Result<Option<Value>, StaticDataError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StaticDataError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value);
        self.write_map(&map).await
    }

    async fn delete(&self, key: &str) -> Result<(), StaticDataError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        } else {
            tracing::trace!(key, path = %self.path.display(), "nothing to delete");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "FileStaticData"
    }
}
