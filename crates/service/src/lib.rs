//! Processing Service boundary.
//!
//! Provides the typed wire messages, the [`ProcessingService`] seam used by
//! the orchestration layer, a reqwest-backed implementation of it, and
//! data-URL decoding for the rendered previews the service returns.

pub mod api;
pub mod data_url;
pub mod messages;
pub mod service;

pub use api::ProcessingApi;
pub use service::{ProcessingService, ServiceError, UploadFile};
