use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;

/// A flat key space of named byte blobs.
///
/// No atomicity is promised across calls. `copy` is the only way to move
/// data between names; callers build renames out of copy + delete.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Names starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;

    async fn get(&self, name: &str) -> Result<Bytes, BlobError>;

    /// Create or overwrite `name`.
    async fn put(&self, name: &str, data: Bytes) -> Result<(), BlobError>;

    /// Remove `name`. Succeeds when it is already absent.
    async fn delete(&self, name: &str) -> Result<(), BlobError>;

    /// Copy `from` over `to`. `NotFound` when `from` is absent.
    async fn copy(&self, from: &str, to: &str) -> Result<(), BlobError>;

    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        match self.get(name).await {
            Ok(_) => Ok(true),
            Err(BlobError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
