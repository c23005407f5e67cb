//! [`BlobStore`] backed by the server's file endpoints.
//!
//! The photo-set lifecycle runs on the client; this adapter turns each
//! store call into one HTTP request. Listings are bounded by a short
//! timeout so a slow server cannot hang the initial load.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use tryon_shared::naming;
use tryon_shared::protocol::{
    encode_data_uri, CopyRequest, DeleteQuery, ListFilesQuery, ListFilesResponse, UploadRequest,
    UploadResponse,
};
use tryon_shared::UserId;
use tryon_store::{BlobError, BlobStore};

use crate::http::{error_parts, ApiClient};

const IMAGE_MIME: &str = "image/jpeg";

pub struct HttpBlobStore {
    api: ApiClient,
    list_timeout: Duration,
}

impl HttpBlobStore {
    pub fn new(api: ApiClient, list_timeout: Duration) -> Self {
        Self { api, list_timeout }
    }
}

fn transport(e: reqwest::Error) -> BlobError {
    if e.is_timeout() {
        BlobError::Transport(format!("request timed out: {e}"))
    } else {
        BlobError::Transport(e.to_string())
    }
}

fn owner_of(name: &str) -> Result<UserId, BlobError> {
    naming::owner_segment(name)
        .and_then(|owner| UserId::parse(owner).ok())
        .ok_or_else(|| BlobError::InvalidName(name.to_string()))
}

/// Pass 2xx responses through, map the rest onto [`BlobError`].
async fn check(response: reqwest::Response, name: &str) -> Result<reqwest::Response, BlobError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let (status, message) = error_parts(response).await;
    Err(match status {
        404 => BlobError::NotFound(name.to_string()),
        400 => BlobError::InvalidName(format!("{name}: {message}")),
        _ => BlobError::Transport(format!("{status}: {message}")),
    })
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let user = naming::user_from_prefix(prefix)
            .ok_or_else(|| BlobError::InvalidName(prefix.to_string()))?;

        let response = self
            .api
            .http()
            .get(self.api.url("/api/files"))
            .query(&ListFilesQuery { user_id: user })
            .timeout(self.list_timeout)
            .send()
            .await
            .map_err(transport)?;
        let response = check(response, prefix).await?;
        let body: ListFilesResponse = response.json().await.map_err(transport)?;

        let mut files: Vec<String> = body
            .files
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect();
        files.sort();
        debug!(prefix, count = files.len(), "Listed blobs");
        Ok(files)
    }

    /// Answered from the owner's listing, so no image is downloaded and the
    /// listing timeout applies.
    async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        let owner = owner_of(name)?;
        let names = self.list(&naming::user_prefix(&owner)).await?;
        Ok(names.iter().any(|n| n == name))
    }

    async fn get(&self, name: &str) -> Result<Bytes, BlobError> {
        let response = self
            .api
            .http()
            .get(self.api.url(&format!("{}/{name}", tryon_shared::constants::IMAGE_ROUTE)))
            .send()
            .await
            .map_err(transport)?;
        let response = check(response, name).await?;
        response.bytes().await.map_err(transport)
    }

    async fn put(&self, name: &str, data: Bytes) -> Result<(), BlobError> {
        if data.is_empty() {
            return Err(BlobError::Empty);
        }
        let parsed =
            naming::parse(name).ok_or_else(|| BlobError::InvalidName(name.to_string()))?;

        let request = UploadRequest {
            image_data: encode_data_uri(IMAGE_MIME, &data),
            kind: parsed.kind,
            index: parsed.index,
            user_id: parsed.user_id,
        };
        let response = self
            .api
            .http()
            .post(self.api.url("/api/files"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        let response = check(response, name).await?;
        let body: UploadResponse = response.json().await.map_err(transport)?;

        if body.file_name != name {
            return Err(BlobError::Storage(format!(
                "server stored {} instead of {name}",
                body.file_name
            )));
        }
        debug!(name, size = data.len(), "Uploaded blob");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), BlobError> {
        let query = DeleteQuery {
            user_id: owner_of(name)?,
            file_name: name.to_string(),
        };
        let response = self
            .api
            .http()
            .delete(self.api.url("/api/files"))
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        match check(response, name).await {
            Ok(_) | Err(BlobError::NotFound(_)) => {
                debug!(name, "Deleted blob");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), BlobError> {
        let request = CopyRequest {
            from: from.to_string(),
            to: to.to_string(),
        };
        let response = self
            .api
            .http()
            .post(self.api.url("/api/files/copy"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        check(response, from).await?;
        debug!(from, to, "Copied blob");
        Ok(())
    }
}
