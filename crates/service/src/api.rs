//! REST client for the Processing Service HTTP endpoints.
//!
//! Wraps upload, preview, process, job-status and download using
//! [`reqwest`].

use async_trait::async_trait;
use cutout_core::job::{ArtifactRef, JobId};
use reqwest::multipart::{Form, Part};

use crate::messages::{
    ErrorBody, JobStatusResponse, PreviewPayload, PreviewResponse, ProcessPayload,
    ProcessResponse, UploadResponse,
};
use crate::service::{ProcessingService, ServiceError, UploadFile};

/// Multipart field name the service reads uploads from.
const UPLOAD_FIELD: &str = "files";

/// HTTP client for one Processing Service instance.
#[derive(Debug, Clone)]
pub struct ProcessingApi {
    client: reqwest::Client,
    base_url: String,
}

impl ProcessingApi {
    /// Create a new API client.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `http://127.0.0.1:7860`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, turning failures
    /// into [`ServiceError::Api`] with the service's message.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ProcessingService for ProcessingApi {
    async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadResponse, ServiceError> {
        let mut form = Form::new();
        for file in files {
            let mime = file.mime_type();
            let part = Part::bytes(file.content)
                .file_name(file.file_name)
                .mime_str(mime)?;
            form = form.part(UPLOAD_FIELD, part);
        }

        let response = self
            .client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn preview(&self, payload: &PreviewPayload) -> Result<PreviewResponse, ServiceError> {
        let response = self
            .client
            .post(self.url("/api/preview"))
            .json(payload)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn process(&self, payload: &ProcessPayload) -> Result<ProcessResponse, ServiceError> {
        let response = self
            .client
            .post(self.url("/api/process"))
            .json(payload)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("/api/job_status/{job_id}")))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn download(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("/download/{artifact}")))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        tracing::debug!(artifact = %artifact, size = bytes.len(), "Downloaded artifact");
        Ok(bytes.to_vec())
    }
}

/// Build an [`ServiceError::Api`], preferring the service's `{ "error": .. }`
/// message over the raw body.
fn api_error(status: u16, body: &str) -> ServiceError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    ServiceError::Api { status, message }
}
