//! Operator-facing notifications backed by a `tokio::sync::broadcast`
//! channel.
//!
//! The session publishes terminal outcomes (upload failures, export
//! results) and export progress here; any number of views can subscribe.

use std::fmt;
use std::path::PathBuf;

use cutout_core::job::{ArtifactRef, JobId};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 64;

/// Severity used by views to pick between a toast and an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Error,
}

/// Something the operator should be told about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    Uploaded { count: usize },
    UploadFailed { message: String },
    ExportStarted { job_id: JobId, assets: usize },
    ExportProgress {
        job_id: JobId,
        progress: u8,
        done: Option<u32>,
        total: Option<u32>,
    },
    ExportFinished {
        job_id: JobId,
        artifact: ArtifactRef,
        saved_to: Option<PathBuf>,
    },
    ExportFailed { job_id: Option<JobId>, message: String },
    DownloadFailed { artifact: ArtifactRef, message: String },
}

impl Notification {
    pub fn level(&self) -> Level {
        match self {
            Self::UploadFailed { .. } | Self::ExportFailed { .. } | Self::DownloadFailed { .. } => {
                Level::Error
            }
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploaded { count } => write!(f, "Uploaded {count} image(s)"),
            Self::UploadFailed { message } => write!(f, "Upload failed: {message}"),
            Self::ExportStarted { job_id, assets } => {
                write!(f, "Export {job_id} started for {assets} image(s)")
            }
            Self::ExportProgress {
                progress,
                done,
                total,
                ..
            } => match (done, total) {
                (Some(done), Some(total)) => write!(f, "Exporting {progress}% ({done}/{total})"),
                _ => write!(f, "Exporting {progress}%"),
            },
            Self::ExportFinished {
                artifact, saved_to, ..
            } => match saved_to {
                Some(path) => write!(f, "Export ready: {}", path.display()),
                None => write!(f, "Export ready: {artifact}"),
            },
            Self::ExportFailed { message, .. } => write!(f, "Export failed: {message}"),
            Self::DownloadFailed { artifact, message } => {
                write!(f, "Could not download {artifact}: {message}")
            }
        }
    }
}

/// Fan-out publisher of [`Notification`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers.
    ///
    /// If nobody is subscribed the notification is dropped.
    pub fn notify(&self, notification: Notification) {
        tracing::debug!(?notification, "Notify");
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
