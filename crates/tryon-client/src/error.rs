use thiserror::Error;

use tryon_shared::{IdentityError, ProtocolError};
use tryon_store::{BlobError, PhotoSetError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Inputs missing for the requested action.
    #[error("Cannot generate yet: {0}")]
    ValidationFailure(String),

    /// The previous generation has not been acknowledged or reset.
    #[error("Previous generation not acknowledged; acknowledge or reset first")]
    NotReady,

    #[error("A generation is already in progress")]
    AlreadyGenerating,

    #[error("Synthesis failed: {0}")]
    Upstream(String),

    #[error("Synthesis timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Storage error: {0}")]
    Blob(#[from] BlobError),

    #[error(transparent)]
    PhotoSet(#[from] PhotoSetError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No body photo at index {0}")]
    NoSuchPhoto(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
