//! Client-side orchestration for the cutout editing workflow.
//!
//! A [`Session`] owns the edit options and the uploaded assets, feeds
//! snapshots of them to the preview pipeline, and drives export jobs to
//! completion. Outcomes the operator should see are published through the
//! [`Notifier`].

pub mod assets;
pub mod config;
pub mod error;
pub mod export;
pub mod notifier;
pub mod preview;
pub mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use notifier::{Notification, Notifier};
pub use session::Session;
