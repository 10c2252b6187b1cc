//! Object store abstraction.
//!
//! Published file bytes live in opaque blob storage addressed by an
//! internal storage id. Blobs written for a publish that never commits
//! are unreferenced and reclaimed out of band.

use crate::errors::{RegistryError, Result};
use crate::types::new_id;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Opaque blob storage: put bytes, get them back by id.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob, returning its storage id.
    async fn put(&self, bytes: Bytes) -> Result<String>;

    /// Fetch a blob by storage id.
    async fn get(&self, storage_id: &str) -> Result<Bytes>;

    /// Remove a blob. Missing ids are not an error.
    async fn delete(&self, storage_id: &str) -> Result<()>;
}

/// In-memory object store for tests and the default dev server.
#[derive(Default)]
pub struct MemoryObjectStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bytes: Bytes) -> Result<String> {
        let id = new_id();
        self.blobs.write().await.insert(id.clone(), bytes);
        Ok(id)
    }

    async fn get(&self, storage_id: &str) -> Result<Bytes> {
        self.blobs
            .read()
            .await
            .get(storage_id)
            .cloned()
            .ok_or_else(|| RegistryError::Storage(format!("blob {storage_id} not found")))
    }

    async fn delete(&self, storage_id: &str) -> Result<()> {
        self.blobs.write().await.remove(storage_id);
        Ok(())
    }
}

/// Filesystem-backed object store: one file per blob under a data dir.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| RegistryError::Storage(format!("create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn blob_path(&self, storage_id: &str) -> Result<PathBuf> {
        // Storage ids are uuids we minted; reject anything path-like.
        if storage_id.is_empty()
            || !storage_id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(RegistryError::Storage(format!("bad storage id {storage_id}")));
        }
        Ok(self.root.join(storage_id))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bytes: Bytes) -> Result<String> {
        let id = new_id();
        let path = self.blob_path(&id)?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| RegistryError::Storage(format!("write {}: {e}", path.display())))?;
        Ok(id)
    }

    async fn get(&self, storage_id: &str) -> Result<Bytes> {
        let path = self.blob_path(storage_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RegistryError::Storage(format!("blob {storage_id} not found")))
            }
            Err(e) => Err(RegistryError::Storage(format!("read {}: {e}", path.display()))),
        }
    }

    async fn delete(&self, storage_id: &str) -> Result<()> {
        let path = self.blob_path(storage_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RegistryError::Storage(format!("delete {}: {e}", path.display()))),
        }
    }
}
