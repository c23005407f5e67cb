use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use tryon_shared::protocol::ErrorBody;
use tryon_shared::{ProtocolError, UserId};
use tryon_store::BlobError;

use crate::synthesis::SynthesisError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Blob too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("A generation is already in progress for {0}")]
    GenerationInFlight(UserId),

    #[error("Synthesis failed: {0}")]
    Upstream(String),

    #[error("Synthesis timed out after {0}s")]
    UpstreamTimeout(u64),
}

impl From<BlobError> for ServerError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::NotFound(name) => Self::BlobNotFound(name),
            BlobError::TooLarge { size, max } => Self::BlobTooLarge { size, max },
            BlobError::InvalidName(name) => Self::BadRequest(format!("Invalid file name: {name}")),
            BlobError::Empty => Self::BadRequest("Empty image".into()),
            BlobError::Storage(msg) | BlobError::Transport(msg) => Self::BlobStorage(msg),
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(e: ProtocolError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<SynthesisError> for ServerError {
    fn from(e: SynthesisError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BlobNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BlobTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ServerError::BlobStorage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Blob storage error".to_string())
            }
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::GenerationInFlight(_) => (StatusCode::CONFLICT, self.to_string()),
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ServerError::UpstreamTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}
