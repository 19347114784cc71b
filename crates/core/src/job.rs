//! Export job bookkeeping.
//!
//! An [`ExportJob`] is created by a successful submit and afterwards only
//! changes through [`ExportJob::observe`], which folds one poll result into
//! the job. Observed progress never goes backwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque job identifier issued by the Processing Service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a finished export archive (a file name on the service).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Finished,
    Error,
}

impl JobState {
    /// `finished` and `error` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One poll result, as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    /// Raw reported progress; may be out of range or regress.
    pub progress: i64,
    pub done: Option<u32>,
    pub total: Option<u32>,
    pub artifact: Option<ArtifactRef>,
    pub files: Vec<String>,
    pub error: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState, progress: i64) -> Self {
        Self {
            state,
            progress,
            done: None,
            total: None,
            artifact: None,
            files: Vec::new(),
            error: None,
        }
    }
}

/// The client's view of a submitted export job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportJob {
    pub job_id: JobId,
    pub status: JobState,
    /// Highest progress observed so far, `0..=100`.
    pub progress: u8,
    pub done: Option<u32>,
    pub total: Option<u32>,
    pub result: Option<ArtifactRef>,
    pub files: Vec<String>,
    pub error: Option<String>,
}

impl ExportJob {
    /// A freshly submitted job, queued at zero progress.
    pub fn submitted(job_id: JobId, total: usize) -> Self {
        Self {
            job_id,
            status: JobState::Queued,
            progress: 0,
            done: Some(0),
            total: u32::try_from(total).ok(),
            result: None,
            files: Vec::new(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fold a poll result into the job.
    ///
    /// Progress is clamped to `0..=100` and never drops below the highest
    /// value already seen. A terminal job ignores further updates.
    pub fn observe(&mut self, status: JobStatus) {
        if self.is_terminal() {
            return;
        }
        let reported = status.progress.clamp(0, 100) as u8;
        self.progress = self.progress.max(reported);
        self.status = status.state;
        if status.done.is_some() {
            self.done = status.done;
        }
        if status.total.is_some() {
            self.total = status.total;
        }
        if !status.files.is_empty() {
            self.files = status.files;
        }
        match status.state {
            JobState::Finished => {
                self.progress = 100;
                self.result = status.artifact;
            }
            JobState::Error => {
                self.error = Some(
                    status
                        .error
                        .unwrap_or_else(|| "Processing failed without a message".to_string()),
                );
            }
            JobState::Queued | JobState::Running => {}
        }
    }

    /// Mark the job failed on the client side (e.g. the service stopped
    /// answering polls).
    pub fn fail_locally(&mut self, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobState::Error;
        self.error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ExportJob {
        ExportJob::submitted(JobId::new("J1"), 2)
    }

    #[test]
    fn progress_regression_is_clamped() {
        let mut j = job();
        j.observe(JobStatus::new(JobState::Running, 40));
        j.observe(JobStatus::new(JobState::Running, 25));
        assert_eq!(j.progress, 40);
        j.observe(JobStatus::new(JobState::Running, 60));
        assert_eq!(j.progress, 60);
    }

    #[test]
    fn out_of_range_progress_is_bounded() {
        let mut j = job();
        j.observe(JobStatus::new(JobState::Running, -10));
        assert_eq!(j.progress, 0);
        j.observe(JobStatus::new(JobState::Running, 250));
        assert_eq!(j.progress, 100);
    }

    #[test]
    fn finished_records_artifact_and_full_progress() {
        let mut j = job();
        let mut done = JobStatus::new(JobState::Finished, 90);
        done.artifact = Some(ArtifactRef::new("out.zip"));
        done.files = vec!["A.png".into(), "B.png".into()];
        j.observe(done);
        assert_eq!(j.status, JobState::Finished);
        assert_eq!(j.progress, 100);
        assert_eq!(j.result, Some(ArtifactRef::new("out.zip")));
        assert_eq!(j.files.len(), 2);
    }

    #[test]
    fn terminal_job_ignores_updates() {
        let mut j = job();
        let mut failed = JobStatus::new(JobState::Error, 10);
        failed.error = Some("boom".into());
        j.observe(failed);
        j.observe(JobStatus::new(JobState::Running, 80));
        assert_eq!(j.status, JobState::Error);
        assert_eq!(j.error.as_deref(), Some("boom"));
        assert_eq!(j.progress, 10);
    }

    #[test]
    fn error_without_message_gets_placeholder() {
        let mut j = job();
        j.observe(JobStatus::new(JobState::Error, 0));
        assert!(j.error.is_some());
    }

    #[test]
    fn local_failure_is_terminal() {
        let mut j = job();
        j.fail_locally("service unreachable");
        assert!(j.is_terminal());
        assert_eq!(j.error.as_deref(), Some("service unreachable"));
    }
}
