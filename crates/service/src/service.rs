//! The seam between the orchestration layer and the Processing Service.
//!
//! [`ProcessingService`] is implemented by [`ProcessingApi`](crate::ProcessingApi)
//! for the real HTTP service; tests substitute scripted fakes.

use std::path::Path;

use async_trait::async_trait;
use cutout_core::job::{ArtifactRef, JobId};

use crate::messages::{
    JobStatusResponse, PreviewPayload, PreviewResponse, ProcessPayload, ProcessResponse,
    UploadResponse,
};

/// One image payload for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content,
        }
    }

    /// Best-effort media type from the file extension.
    pub fn mime_type(&self) -> &'static str {
        let ext = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            Some("tif" | "tiff") => "image/tiff",
            _ => "application/octet-stream",
        }
    }
}

/// Errors from the Processing Service boundary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("Processing service error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The service's `error` field, or the raw body.
        message: String,
    },

    /// A response payload could not be interpreted.
    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Operations the client needs from the Processing Service.
#[async_trait]
pub trait ProcessingService: Send + Sync {
    /// `POST /api/upload` with every file in one multipart request.
    async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadResponse, ServiceError>;

    /// `POST /api/preview`.
    async fn preview(&self, payload: &PreviewPayload) -> Result<PreviewResponse, ServiceError>;

    /// `POST /api/process`.
    async fn process(&self, payload: &ProcessPayload) -> Result<ProcessResponse, ServiceError>;

    /// `GET /api/job_status/{jobId}`.
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, ServiceError>;

    /// `GET /download/{zip}`.
    async fn download(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_from_extension() {
        assert_eq!(UploadFile::new("a.PNG", vec![]).mime_type(), "image/png");
        assert_eq!(UploadFile::new("dir/b.jpeg", vec![]).mime_type(), "image/jpeg");
        assert_eq!(UploadFile::new("noext", vec![]).mime_type(), "application/octet-stream");
    }
}
