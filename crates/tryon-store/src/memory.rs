//! In-memory [`BlobStore`] with fault injection.
//!
//! Used by tests across the workspace to drive the partial-failure paths of
//! the renumbering cascade and the garment replacement.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};

use crate::blob::BlobStore;
use crate::error::BlobError;

#[derive(Debug, Default)]
struct Faults {
    /// `copy(_, to)` fails for these targets.
    copy_to: HashSet<String>,
    /// `delete(name)` fails for these names.
    delete: HashSet<String>,
    /// `put(name, _)` fails for these names.
    put: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Bytes>>,
    faults: Mutex<Faults>,
    log: Mutex<Vec<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every copy onto `to` fail until cleared.
    pub async fn fail_copy_to(&self, to: &str) {
        self.faults.lock().await.copy_to.insert(to.to_string());
    }

    pub async fn fail_delete(&self, name: &str) {
        self.faults.lock().await.delete.insert(name.to_string());
    }

    pub async fn fail_put(&self, name: &str) {
        self.faults.lock().await.put.insert(name.to_string());
    }

    pub async fn clear_faults(&self) {
        *self.faults.lock().await = Faults::default();
    }

    /// All stored names, sorted.
    pub async fn names(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }

    /// Mutating operations applied so far, e.g. `"copy a -> b"`.
    pub async fn operations(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }

    async fn record(&self, op: String) {
        self.log.lock().await.push(op);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        Ok(self
            .blobs
            .read()
            .await
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Bytes, BlobError> {
        self.blobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(name.to_string()))
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), BlobError> {
        if self.faults.lock().await.put.contains(name) {
            return Err(BlobError::Storage(format!("injected put failure: {name}")));
        }
        if data.is_empty() {
            return Err(BlobError::Empty);
        }
        self.blobs.write().await.insert(name.to_string(), data);
        self.record(format!("put {name}")).await;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        if self.faults.lock().await.delete.contains(name) {
            return Err(BlobError::Storage(format!("injected delete failure: {name}")));
        }
        self.blobs.write().await.remove(name);
        self.record(format!("delete {name}")).await;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), BlobError> {
        if self.faults.lock().await.copy_to.contains(to) {
            return Err(BlobError::Storage(format!("injected copy failure: {from} -> {to}")));
        }
        let mut blobs = self.blobs.write().await;
        let data = blobs
            .get(from)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(from.to_string()))?;
        blobs.insert(to.to_string(), data);
        drop(blobs);
        self.record(format!("copy {from} -> {to}")).await;
        Ok(())
    }
}
