//! Session-level error taxonomy.
//!
//! Every failure at the network boundary is converted into one of these
//! kinds before it reaches the presentation layer.

use std::time::Duration;

use cutout_core::job::JobId;
use cutout_service::ServiceError;

/// Errors returned by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The upload was rejected or never reached the service.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The service refused to create an export job.
    #[error("Export submission failed: {0}")]
    Submit(String),

    /// The export job ended in `error`.
    #[error("Export job failed: {0}")]
    Job(String),

    /// A single status poll failed; the job may still be running.
    #[error("Job status poll failed: {0}")]
    Poll(String),

    /// The finished archive could not be retrieved or written.
    #[error("Download failed: {0}")]
    Download(String),

    /// Referenced an entity the session does not know.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A new export was requested while one is still queued or running.
    #[error("Export job {0} is still in progress")]
    JobInProgress(JobId),

    /// Job operations were invoked with no job submitted.
    #[error("No export job is being tracked")]
    NoActiveJob,
}

impl SessionError {
    /// Whether the operator should be told about this error. Contract
    /// violations (`NotFound`, `JobInProgress`, `NoActiveJob`) are not.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Self::NotFound { .. } | Self::JobInProgress(_) | Self::NoActiveJob
        )
    }
}

/// Why a preview round trip produced nothing. Never surfaced to the
/// operator; only logged.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Preview timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations_are_not_user_facing() {
        assert!(!SessionError::NoActiveJob.is_user_facing());
        assert!(!SessionError::JobInProgress(JobId::new("J1")).is_user_facing());
        assert!(!SessionError::NotFound { entity: "Asset", id: "x".into() }.is_user_facing());
        assert!(SessionError::Upload("bad".into()).is_user_facing());
        assert!(SessionError::Job("bad".into()).is_user_facing());
    }
}
