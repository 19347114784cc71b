#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cutout_core::job::{ArtifactRef, JobId, JobState};
use cutout_service::messages::{
    JobStatusResponse, PreviewPayload, PreviewResponse, ProcessPayload, ProcessResponse,
    UploadResponse,
};
use cutout_service::{ProcessingService, ServiceError, UploadFile};
use tokio::sync::Semaphore;

/// Bytes served for every download.
pub const ARCHIVE_BYTES: &[u8] = b"PK\x03\x04cutout";

/// Scripted in-memory stand-in for the Processing Service.
///
/// Calls are recorded. Uploads assign each file its stem as id unless a
/// response was queued; job polls pop queued statuses and report
/// `running` once the queue is empty.
#[derive(Default)]
pub struct FakeService {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    uploads: Vec<Vec<String>>,
    upload_responses: VecDeque<Result<UploadResponse, ServiceError>>,
    upload_preview: Option<String>,

    previews: Vec<PreviewPayload>,
    preview_delay: Duration,
    preview_gate: Option<Arc<Semaphore>>,
    fail_previews: bool,

    processes: Vec<ProcessPayload>,
    process_responses: VecDeque<Result<ProcessResponse, ServiceError>>,

    status_calls: Vec<JobId>,
    statuses: VecDeque<Result<JobStatusResponse, ServiceError>>,
    stall_status: bool,

    downloads: Vec<ArtifactRef>,
    fail_downloads: bool,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ---- scripting ----

    pub fn queue_upload(&self, response: Result<UploadResponse, ServiceError>) {
        self.lock().upload_responses.push_back(response);
    }

    /// Data URL attached to every default upload response.
    pub fn set_upload_preview(&self, preview: &str) {
        self.lock().upload_preview = Some(preview.to_string());
    }

    pub fn set_preview_delay(&self, delay: Duration) {
        self.lock().preview_delay = delay;
    }

    /// Hold every preview response until [`FakeService::release_previews`]
    /// lets it through.
    pub fn gate_previews(&self) {
        self.lock().preview_gate = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_previews(&self, count: usize) {
        if let Some(gate) = &self.lock().preview_gate {
            gate.add_permits(count);
        }
    }

    pub fn set_fail_previews(&self, fail: bool) {
        self.lock().fail_previews = fail;
    }

    pub fn queue_process(&self, response: Result<ProcessResponse, ServiceError>) {
        self.lock().process_responses.push_back(response);
    }

    pub fn queue_status(&self, response: Result<JobStatusResponse, ServiceError>) {
        self.lock().statuses.push_back(response);
    }

    /// Status requests never answer.
    pub fn stall_status(&self) {
        self.lock().stall_status = true;
    }

    pub fn set_fail_downloads(&self, fail: bool) {
        self.lock().fail_downloads = fail;
    }

    // ---- recorded calls ----

    pub fn uploads(&self) -> Vec<Vec<String>> {
        self.lock().uploads.clone()
    }

    pub fn previews(&self) -> Vec<PreviewPayload> {
        self.lock().previews.clone()
    }

    pub fn processes(&self) -> Vec<ProcessPayload> {
        self.lock().processes.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.lock().status_calls.len()
    }

    pub fn downloads(&self) -> Vec<ArtifactRef> {
        self.lock().downloads.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl ProcessingService for FakeService {
    async fn upload(&self, files: Vec<UploadFile>) -> Result<UploadResponse, ServiceError> {
        let mut state = self.lock();
        let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();
        state.uploads.push(names.clone());

        if let Some(response) = state.upload_responses.pop_front() {
            return response;
        }
        Ok(UploadResponse {
            file_ids: names.iter().map(|n| stem(n)).collect(),
            preview: state.upload_preview.clone(),
            mask: None,
        })
    }

    async fn preview(&self, payload: &PreviewPayload) -> Result<PreviewResponse, ServiceError> {
        let (delay, gate, fail) = {
            let mut state = self.lock();
            state.previews.push(payload.clone());
            (state.preview_delay, state.preview_gate.clone(), state.fail_previews)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        if fail {
            return Err(api_error(500, "Preview failed"));
        }
        Ok(PreviewResponse {
            preview: preview_url(&payload.file_id, payload.options.blur_background),
        })
    }

    async fn process(&self, payload: &ProcessPayload) -> Result<ProcessResponse, ServiceError> {
        let mut state = self.lock();
        state.processes.push(payload.clone());
        state.process_responses.pop_front().unwrap_or_else(|| {
            Ok(ProcessResponse {
                job_id: format!("J{}", state.processes.len()),
            })
        })
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusResponse, ServiceError> {
        let stall = {
            let mut state = self.lock();
            state.status_calls.push(job_id.clone());
            state.stall_status
        };
        if stall {
            std::future::pending::<()>().await;
        }
        self.lock()
            .statuses
            .pop_front()
            .unwrap_or_else(|| Ok(status(JobState::Running, 10)))
    }

    async fn download(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ServiceError> {
        let mut state = self.lock();
        state.downloads.push(artifact.clone());
        if state.fail_downloads {
            return Err(api_error(404, "File not found"));
        }
        Ok(ARCHIVE_BYTES.to_vec())
    }
}

/* -------------------------------------------------------------------------- */

/// Data URL the fake renders for a preview of `file_id` at `blur`.
pub fn preview_url(file_id: &str, blur: u32) -> String {
    format!("data:image/png;base64,{file_id}{blur}")
}

pub fn status(state: JobState, progress: i64) -> JobStatusResponse {
    JobStatusResponse {
        status: state,
        progress: Some(progress),
        done: None,
        total: None,
        zip: None,
        files: None,
        error: None,
    }
}

pub fn finished(zip: &str) -> JobStatusResponse {
    JobStatusResponse {
        zip: Some(zip.to_string()),
        ..status(JobState::Finished, 100)
    }
}

pub fn failed(message: &str) -> JobStatusResponse {
    JobStatusResponse {
        error: Some(message.to_string()),
        ..status(JobState::Error, 0)
    }
}

pub fn api_error(status: u16, message: &str) -> ServiceError {
    ServiceError::Api {
        status,
        message: message.to_string(),
    }
}

pub fn png(name: &str) -> UploadFile {
    UploadFile::new(name, vec![0x89, b'P', b'N', b'G'])
}

fn stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
