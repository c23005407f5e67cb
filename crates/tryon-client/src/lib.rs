//! # tryon-client
//!
//! Client side of the try-on app. The photo-set lifecycle from
//! `tryon-store` runs here on top of [`HttpBlobStore`], which maps each
//! store call onto the server's file endpoints. [`TryOnSession`] ties the
//! photo set, the selected body photo and the [`GenerationWorkflow`]
//! together for one user.

pub mod config;
pub mod http;
pub mod http_store;
pub mod session;
pub mod synthesis;
pub mod workflow;

mod error;

pub use config::ClientConfig;
pub use error::{ClientError, Result, WorkflowError};
pub use http::ApiClient;
pub use http_store::HttpBlobStore;
pub use session::TryOnSession;
pub use synthesis::{GenerationInputs, HttpSynthesisService, SynthesisService};
pub use workflow::{GenerationResult, GenerationState, GenerationWorkflow};
