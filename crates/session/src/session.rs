//! The orchestration context for one editing session.
//!
//! A [`Session`] is the single writer of the edit options and the asset
//! set. Every mutation goes through it; the preview pipeline and the
//! export tracker only ever see snapshots.

use std::path::PathBuf;
use std::sync::Arc;

use cutout_core::asset::{Asset, AssetId};
use cutout_core::compare::CompareView;
use cutout_core::job::{ArtifactRef, ExportJob, JobId};
use cutout_core::options::{BackgroundMode, EditOptions, OptionsEdit, OptionsModel};
use cutout_service::data_url::DataUrl;
use cutout_service::{ProcessingService, UploadFile};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::assets::{AssetStore, UploadOutcome};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::export::{ExportJobTracker, TrackOutcome};
use crate::notifier::{Notification, Notifier};
use crate::preview::{PreviewHandle, PreviewKey, PreviewOrchestrator, PreviewStats, RenderedPreview};

/// Result of a completed export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// The archive was produced; `saved_to` is set when it was written to
    /// the download directory.
    Finished {
        job_id: JobId,
        artifact: ArtifactRef,
        saved_to: Option<PathBuf>,
    },
    /// Tracking stopped before the job finished.
    Abandoned { job_id: JobId },
}

pub struct Session {
    config: SessionConfig,
    service: Arc<dyn ProcessingService>,
    options: OptionsModel,
    assets: AssetStore,
    compare: CompareView,
    /// Segmentation mask from the latest upload, keyed by its first asset.
    upload_mask: Option<(AssetId, DataUrl)>,
    preview: PreviewHandle,
    export: ExportJobTracker,
    notifier: Notifier,
    cancel: CancellationToken,
}

impl Session {
    /// Create a session and start its preview pipeline. Must be called
    /// from within a tokio runtime.
    pub fn start(config: SessionConfig, service: Arc<dyn ProcessingService>) -> Self {
        let cancel = CancellationToken::new();
        let preview =
            PreviewOrchestrator::spawn(Arc::clone(&service), config.preview.clone(), &cancel);
        let export = ExportJobTracker::new(Arc::clone(&service), config.export.clone());

        tracing::info!(service_url = %config.service_url, "Session started");

        Self {
            assets: AssetStore::new(Arc::clone(&service)),
            config,
            service,
            options: OptionsModel::default(),
            compare: CompareView::default(),
            upload_mask: None,
            preview,
            export,
            notifier: Notifier::default(),
            cancel,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn options(&self) -> &EditOptions {
        self.options.current()
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn current_asset(&self) -> Option<&Asset> {
        self.assets.current()
    }

    pub fn compare(&self) -> &CompareView {
        &self.compare
    }

    pub fn compare_mut(&mut self) -> &mut CompareView {
        &mut self.compare
    }

    /// The mask returned with the most recent upload, if the service sent
    /// one.
    pub fn upload_mask(&self) -> Option<(&AssetId, &DataUrl)> {
        self.upload_mask.as_ref().map(|(id, mask)| (id, mask))
    }

    pub fn export_job(&self) -> Option<&ExportJob> {
        self.export.job()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn subscribe_preview(&self) -> watch::Receiver<Option<Arc<RenderedPreview>>> {
        self.preview.subscribe()
    }

    pub fn latest_preview(&self) -> Option<Arc<RenderedPreview>> {
        self.preview.latest()
    }

    /// Apply a batch of edits. Returns `true` if the options changed, in
    /// which case a preview refresh is scheduled.
    pub fn edit(&mut self, edits: impl IntoIterator<Item = OptionsEdit>) -> bool {
        let changed = self.options.set(edits);
        if changed {
            tracing::debug!(revision = self.options.revision(), "Options changed");
            self.refresh_preview();
        }
        changed
    }

    /// Upload source images. Failures are also published as
    /// [`Notification::UploadFailed`].
    pub async fn upload(&mut self, files: Vec<UploadFile>) -> Result<Vec<Asset>, SessionError> {
        let outcome = match self.assets.upload(files).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notifier.notify(Notification::UploadFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        let UploadOutcome {
            assets,
            preview,
            mask,
        } = outcome;
        self.upload_mask = assets.first().map(|a| a.id.clone()).zip(mask);

        self.refresh_preview();
        // The upload response carries a rendering of the first new image
        // with default options.
        if let (Some(first), Some(image)) = (assets.first(), preview) {
            let key = PreviewKey::new(first.id.clone(), EditOptions::default());
            self.preview.seed(key, image);
        }

        self.notifier.notify(Notification::Uploaded {
            count: assets.len(),
        });
        Ok(assets)
    }

    /// Upload a background picture and switch the background to it.
    pub async fn set_background_image(&mut self, file: UploadFile) -> Result<Asset, SessionError> {
        let asset = match self.assets.upload_background(file).await {
            Ok(asset) => asset,
            Err(e) => {
                self.notifier.notify(Notification::UploadFailed {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        self.edit([
            OptionsEdit::BackgroundImage(Some(asset.id.clone())),
            OptionsEdit::BackgroundMode(BackgroundMode::Image),
        ]);
        Ok(asset)
    }

    pub fn select(&mut self, id: &AssetId) -> Result<&Asset, SessionError> {
        self.assets.select(id)?;
        self.refresh_preview();
        self.assets.current().ok_or_else(|| SessionError::NotFound {
            entity: "Asset",
            id: id.to_string(),
        })
    }

    /// Export only the current image.
    pub async fn export_current(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<ExportOutcome, SessionError> {
        let ids: Vec<AssetId> = self.assets.current().map(|a| a.id.clone()).into_iter().collect();
        self.export(ids, cancel).await
    }

    /// Export every uploaded image, in upload order, as one job.
    pub async fn export_all(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<ExportOutcome, SessionError> {
        let ids = self.assets.ids();
        self.export(ids, cancel).await
    }

    /// Stop the preview pipeline and any tracking in progress.
    pub async fn shutdown(&mut self) -> Option<PreviewStats> {
        self.cancel.cancel();
        self.export.abandon();
        let stats = self.preview.shutdown().await;
        tracing::info!("Session closed");
        stats
    }

    // ---- private helpers ----

    fn refresh_preview(&self) {
        let key = self
            .assets
            .current()
            .map(|asset| PreviewKey::new(asset.id.clone(), self.options.snapshot()));
        self.preview.notify(key);
    }

    async fn export(
        &mut self,
        asset_ids: Vec<AssetId>,
        cancel: &CancellationToken,
    ) -> Result<ExportOutcome, SessionError> {
        let options = self.options.snapshot();
        let job_id = match self.export.submit(&asset_ids, &options).await {
            Ok(job_id) => job_id,
            Err(e) => {
                if e.is_user_facing() {
                    self.notifier.notify(Notification::ExportFailed {
                        job_id: None,
                        message: e.to_string(),
                    });
                }
                return Err(e);
            }
        };
        self.notifier.notify(Notification::ExportStarted {
            job_id: job_id.clone(),
            assets: asset_ids.len(),
        });

        let notifier = self.notifier.clone();
        let mut last_progress = None;
        let tracked = self
            .export
            .track(cancel, |job| {
                let snapshot = (job.progress, job.done, job.total);
                if last_progress != Some(snapshot) {
                    last_progress = Some(snapshot);
                    notifier.notify(Notification::ExportProgress {
                        job_id: job.job_id.clone(),
                        progress: job.progress,
                        done: job.done,
                        total: job.total,
                    });
                }
            })
            .await;

        match tracked {
            Ok(TrackOutcome::Finished(artifact)) => {
                let saved_to = self.download(&artifact).await;
                self.notifier.notify(Notification::ExportFinished {
                    job_id: job_id.clone(),
                    artifact: artifact.clone(),
                    saved_to: saved_to.clone(),
                });
                Ok(ExportOutcome::Finished {
                    job_id,
                    artifact,
                    saved_to,
                })
            }
            Ok(TrackOutcome::Abandoned) => {
                self.export.abandon();
                Ok(ExportOutcome::Abandoned { job_id })
            }
            Err(e) => {
                self.notifier.notify(Notification::ExportFailed {
                    job_id: Some(job_id),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Fetch the archive and write it into the download directory. A
    /// failure is published but does not fail the export itself.
    async fn download(&self, artifact: &ArtifactRef) -> Option<PathBuf> {
        match self.save_artifact(artifact).await {
            Ok(path) => {
                tracing::info!(artifact = %artifact, path = %path.display(), "Export saved");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(artifact = %artifact, error = %e, "Export download failed");
                self.notifier.notify(Notification::DownloadFailed {
                    artifact: artifact.clone(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    async fn save_artifact(&self, artifact: &ArtifactRef) -> Result<PathBuf, SessionError> {
        let bytes = self
            .service
            .download(artifact)
            .await
            .map_err(|e| SessionError::Download(e.to_string()))?;

        let file_name = std::path::Path::new(artifact.as_str())
            .file_name()
            .ok_or_else(|| SessionError::Download(format!("invalid archive name '{artifact}'")))?;
        let path = self.config.download_dir.join(file_name);

        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .map_err(|e| SessionError::Download(e.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SessionError::Download(e.to_string()))?;
        Ok(path)
    }
}
