//! Export job submission and polling.
//!
//! One [`ExportJobTracker`] follows at most one job at a time. Polls are
//! strictly sequential; a poll is only issued after the previous one has
//! completed.

use std::sync::Arc;

use cutout_core::asset::AssetId;
use cutout_core::job::{ArtifactRef, ExportJob, JobId, JobState};
use cutout_core::options::EditOptions;
use cutout_service::messages::{ProcessPayload, WireOptions};
use cutout_service::ProcessingService;
use tokio_util::sync::CancellationToken;

use crate::config::ExportConfig;
use crate::error::SessionError;

/// How [`ExportJobTracker::track`] ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The job finished; the archive reference is delivered here once.
    Finished(ArtifactRef),
    /// The observer went away before the job reached a terminal state.
    Abandoned,
}

pub struct ExportJobTracker {
    service: Arc<dyn ProcessingService>,
    config: ExportConfig,
    job: Option<ExportJob>,
    artifact_taken: bool,
}

impl ExportJobTracker {
    pub fn new(service: Arc<dyn ProcessingService>, config: ExportConfig) -> Self {
        Self {
            service,
            config,
            job: None,
            artifact_taken: false,
        }
    }

    /// The job being tracked, terminal or not.
    pub fn job(&self) -> Option<&ExportJob> {
        self.job.as_ref()
    }

    /// Submit `asset_ids` as one batch.
    ///
    /// Fails with [`SessionError::JobInProgress`] while the previous job is
    /// still queued or running. A rejected submission leaves the previous
    /// job in place.
    pub async fn submit(
        &mut self,
        asset_ids: &[AssetId],
        options: &EditOptions,
    ) -> Result<JobId, SessionError> {
        if let Some(job) = self.job.as_ref().filter(|j| !j.is_terminal()) {
            return Err(SessionError::JobInProgress(job.job_id.clone()));
        }
        if asset_ids.is_empty() {
            return Err(SessionError::Submit("No images to export".to_string()));
        }

        let payload = ProcessPayload {
            file_ids: asset_ids.iter().map(|id| id.to_string()).collect(),
            options: WireOptions::from(options),
        };

        let response = self.service.process(&payload).await.map_err(|e| {
            tracing::warn!(error = %e, assets = asset_ids.len(), "Export submission rejected");
            SessionError::Submit(e.to_string())
        })?;

        let job_id = JobId::new(response.job_id);
        tracing::info!(job_id = %job_id, assets = asset_ids.len(), "Export job submitted");

        self.job = Some(ExportJob::submitted(job_id.clone(), asset_ids.len()));
        self.artifact_taken = false;
        Ok(job_id)
    }

    /// One status round trip. A terminal job is returned without
    /// contacting the service.
    pub async fn poll(&mut self) -> Result<&ExportJob, SessionError> {
        let job = self.job.as_mut().ok_or(SessionError::NoActiveJob)?;
        if job.is_terminal() {
            return Ok(&*job);
        }

        let response = self
            .service
            .job_status(&job.job_id)
            .await
            .map_err(|e| SessionError::Poll(e.to_string()))?;

        job.observe(response.into());
        tracing::debug!(
            job_id = %job.job_id,
            status = %job.status,
            progress = job.progress,
            "Export job polled",
        );
        Ok(&*job)
    }

    /// Hand out the finished archive reference. Returns `Some` at most
    /// once per job.
    pub fn take_artifact(&mut self) -> Option<ArtifactRef> {
        if self.artifact_taken {
            return None;
        }
        let artifact = self.job.as_ref()?.result.clone()?;
        self.artifact_taken = true;
        Some(artifact)
    }

    /// Stop following the current job. The service may keep running it;
    /// its result is ignored and a new job may be submitted.
    pub fn abandon(&mut self) {
        if let Some(job) = self.job.as_mut().filter(|j| !j.is_terminal()) {
            tracing::info!(job_id = %job.job_id, "Export job abandoned");
            job.fail_locally("Export abandoned");
        }
    }

    /// Poll until the job is terminal or `cancel` fires. Cancellation
    /// also interrupts a status request that is still outstanding.
    ///
    /// The first poll is immediate, then one per `poll_interval`.
    /// `on_progress` sees the job after every successful poll. Up to
    /// `max_poll_failures` consecutive failed polls are tolerated before
    /// the job is marked failed locally.
    pub async fn track(
        &mut self,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(&ExportJob),
    ) -> Result<TrackOutcome, SessionError> {
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(TrackOutcome::Abandoned);
            }

            // A hung status request must not outlive the observer.
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(TrackOutcome::Abandoned),
                polled = self.poll() => polled,
            };

            match polled {
                Ok(job) => {
                    failures = 0;
                    on_progress(job);
                    let status = job.status;
                    match status {
                        JobState::Finished => return self.finish(),
                        JobState::Error => {
                            let message = job
                                .error
                                .clone()
                                .unwrap_or_else(|| "Processing failed".to_string());
                            tracing::warn!(job_id = %job.job_id, error = %message, "Export job failed");
                            return Err(SessionError::Job(message));
                        }
                        JobState::Queued | JobState::Running => {}
                    }
                }
                Err(SessionError::Poll(message)) => {
                    failures += 1;
                    tracing::warn!(
                        attempt = failures,
                        max = self.config.max_poll_failures,
                        error = %message,
                        "Export status poll failed",
                    );
                    if failures >= self.config.max_poll_failures {
                        let message = format!("Lost contact with the export job: {message}");
                        if let Some(job) = self.job.as_mut() {
                            job.fail_locally(message.clone());
                        }
                        return Err(SessionError::Job(message));
                    }
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(TrackOutcome::Abandoned),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    // ---- private helpers ----

    fn finish(&mut self) -> Result<TrackOutcome, SessionError> {
        if self.artifact_taken {
            return Err(SessionError::NoActiveJob);
        }
        match self.take_artifact() {
            Some(artifact) => {
                tracing::info!(artifact = %artifact, "Export job finished");
                Ok(TrackOutcome::Finished(artifact))
            }
            None => Err(SessionError::Job(
                "Export finished without an archive".to_string(),
            )),
        }
    }
}
