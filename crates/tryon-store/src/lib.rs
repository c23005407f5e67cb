//! # tryon-store
//!
//! Blob storage and the per-user photo-set lifecycle.
//!
//! The crate exposes the [`BlobStore`] contract (a flat, non-transactional
//! key space of named images) with a filesystem and an in-memory backend,
//! and the [`PhotoSetManager`] that keeps each user's body photos numbered
//! `1..=N` without gaps on top of it.

pub mod blob;
pub mod fs;
pub mod memory;
pub mod models;
pub mod photo_set;
pub mod renumber;

mod error;

pub use blob::BlobStore;
pub use error::{BlobError, PhotoSetError};
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use models::*;
pub use photo_set::PhotoSetManager;
pub use renumber::{RenameStep, RenumberSaga};
