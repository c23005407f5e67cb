use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::error::BlobError;

/// Temporary files are written under this prefix and renamed into place.
const TMP_PREFIX: &str = ".tmp-";

/// Reject names that could escape the base directory or collide with
/// in-flight temporary files.
fn validate_name(name: &str) -> Result<(), BlobError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name.bytes().all(|b| b.is_ascii_graphic() && b != b'/' && b != b'\\');
    if !valid {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Verify that a resolved path stays within the base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, BlobError> {
    let mut resolved = base.to_path_buf();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            _ => {
                return Err(BlobError::InvalidName(target.display().to_string()));
            }
        }
    }
    if !resolved.starts_with(base) || resolved == base {
        return Err(BlobError::InvalidName(target.display().to_string()));
    }
    Ok(resolved)
}

fn io_error(op: &str, name: &str, e: std::io::Error) -> BlobError {
    if e.kind() == ErrorKind::NotFound {
        BlobError::NotFound(name.to_string())
    } else {
        BlobError::Storage(format!("Failed to {op} {name}: {e}"))
    }
}

/// Blobs stored as plain files in one directory, file name = blob name.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl FsBlobStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, BlobError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            BlobError::Storage(format!(
                "Failed to create blob directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Blob store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, BlobError> {
        validate_name(name)?;
        ensure_within(&self.base_path, &self.base_path.join(name))
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        self.base_path
            .join(format!("{TMP_PREFIX}{}-{name}", Uuid::new_v4().simple()))
    }

    /// Write `data` beside the target and rename it into place so readers
    /// never observe a half-written image.
    async fn write_replace(&self, name: &str, target: &Path, data: &[u8]) -> Result<(), BlobError> {
        let tmp = self.tmp_path(name);
        fs::write(&tmp, data)
            .await
            .map_err(|e| io_error("write", name, e))?;
        if let Err(e) = fs::rename(&tmp, target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error("replace", name, e));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| BlobError::Storage(format!("Failed to list blobs: {}", e)))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            BlobError::Storage(format!("Failed to read directory entry: {}", e))
        })? {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) && validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn get(&self, name: &str) -> Result<Bytes, BlobError> {
        let path = self.blob_path(name)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| io_error("read", name, e))?;

        debug!(name = %name, size = data.len(), "Retrieved blob");
        Ok(Bytes::from(data))
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), BlobError> {
        if data.is_empty() {
            return Err(BlobError::Empty);
        }
        if data.len() > self.max_size {
            return Err(BlobError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = self.blob_path(name)?;
        self.write_replace(name, &path, &data).await?;

        debug!(name = %name, size = data.len(), "Stored blob");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        let path = self.blob_path(name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(name = %name, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(name = %name, "Delete of absent blob ignored");
                Ok(())
            }
            Err(e) => Err(io_error("delete", name, e)),
        }
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), BlobError> {
        let src = self.blob_path(from)?;
        let dst = self.blob_path(to)?;

        let tmp = self.tmp_path(to);
        fs::copy(&src, &tmp)
            .await
            .map_err(|e| io_error("copy", from, e))?;
        if let Err(e) = fs::rename(&tmp, &dst).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error("replace", to, e));
        }

        debug!(from = %from, to = %to, "Copied blob");
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        let path = self.blob_path(name)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| io_error("stat", name, e))
    }
}
