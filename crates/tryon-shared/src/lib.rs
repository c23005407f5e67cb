//! # tryon-shared
//!
//! Types shared by every crate of the try-on workspace: the user identity and
//! its one-time provisioning, the blob naming scheme, the HTTP wire protocol
//! and a handful of constants.

pub mod constants;
pub mod error;
pub mod identity;
pub mod naming;
pub mod protocol;
pub mod types;

pub use error::{IdentityError, ProtocolError};
pub use types::{SlotKind, UserId};
