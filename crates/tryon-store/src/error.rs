use thiserror::Error;

use crate::renumber::RenumberSaga;

/// Errors produced by a [`BlobStore`](crate::BlobStore) backend.
#[derive(Error, Debug)]
pub enum BlobError {
    /// The named blob does not exist.
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The name is not acceptable to the backend (separators, traversal...).
    #[error("Invalid blob name: {0:?}")]
    InvalidName(String),

    #[error("Empty blob")]
    Empty,

    #[error("Blob too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// Backend I/O failure.
    #[error("Blob storage error: {0}")]
    Storage(String),

    /// The backend could not be reached (remote stores only).
    #[error("Blob store unreachable: {0}")]
    Transport(String),
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors produced by [`PhotoSetManager`](crate::PhotoSetManager).
#[derive(Error, Debug)]
pub enum PhotoSetError {
    /// All body slots are taken. Raised before anything is written.
    #[error("Body photo capacity exceeded (max {max})")]
    CapacityExceeded { max: u8 },

    /// The caller asked to delete an index that is not in its slot list.
    #[error("No body photo at index {0}")]
    NoSuchSlot(u8),

    /// The renumbering cascade stopped part way. `renamed` lists the
    /// canonical names successfully written before the failure; the local
    /// slot list is no longer trustworthy and must be re-read.
    #[error("Renumbering interrupted after {} rename(s): {cause}", .renamed.len())]
    PartialRenameFailure {
        renamed: Vec<String>,
        saga: RenumberSaga,
        #[source]
        cause: BlobError,
    },

    #[error(transparent)]
    Store(#[from] BlobError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PhotoSetError>;
