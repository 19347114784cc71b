//! The set of uploaded source images and the current selection.
//!
//! Uploads are atomic: either every file in a call is accepted and
//! appended, or the store is left untouched. The asset sequence is
//! append-only and keeps upload order.

use std::sync::Arc;

use cutout_core::asset::{Asset, AssetId};
use cutout_service::data_url::DataUrl;
use cutout_service::{ProcessingService, UploadFile};

use crate::error::SessionError;

/// Result of a successful [`AssetStore::upload`].
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The newly added assets, in upload order.
    pub assets: Vec<Asset>,
    /// Preview of the first new asset rendered with default options.
    pub preview: Option<DataUrl>,
    /// Segmentation mask of the first new asset.
    pub mask: Option<DataUrl>,
}

pub struct AssetStore {
    service: Arc<dyn ProcessingService>,
    assets: Vec<Asset>,
    /// Background pictures; referenced by options, never exported.
    backgrounds: Vec<Asset>,
    current: Option<usize>,
}

impl AssetStore {
    pub fn new(service: Arc<dyn ProcessingService>) -> Self {
        Self {
            service,
            assets: Vec::new(),
            backgrounds: Vec::new(),
            current: None,
        }
    }

    /// Upload every file in one call.
    ///
    /// On success the assets are appended and, if nothing was selected,
    /// the first new one becomes current.
    pub async fn upload(&mut self, files: Vec<UploadFile>) -> Result<UploadOutcome, SessionError> {
        let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();
        let response = self.send(files).await?;

        let assets: Vec<Asset> = response
            .file_ids
            .into_iter()
            .zip(names)
            .map(|(id, name)| Asset::new(AssetId::new(id), name))
            .collect();

        let first_new = self.assets.len();
        self.assets.extend(assets.iter().cloned());
        if self.current.is_none() {
            self.current = Some(first_new);
        }

        tracing::info!(
            count = assets.len(),
            total = self.assets.len(),
            current = ?self.current().map(|a| a.id.as_str()),
            "Uploaded assets",
        );

        Ok(UploadOutcome {
            assets,
            preview: response.preview.map(DataUrl::new),
            mask: response.mask.map(DataUrl::new),
        })
    }

    /// Upload a single background picture.
    ///
    /// It is kept apart from the exportable sequence and does not change
    /// the current selection.
    pub async fn upload_background(&mut self, file: UploadFile) -> Result<Asset, SessionError> {
        let name = file.file_name.clone();
        let response = self.send(vec![file]).await?;
        let id = response
            .file_ids
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::Upload("service returned no file id".to_string()))?;
        let asset = Asset::new(AssetId::new(id), name);
        tracing::info!(asset_id = %asset.id, "Uploaded background image");
        self.backgrounds.push(asset.clone());
        Ok(asset)
    }

    /// Make `id` the current asset.
    pub fn select(&mut self, id: &AssetId) -> Result<&Asset, SessionError> {
        let index = self
            .assets
            .iter()
            .position(|a| &a.id == id)
            .ok_or_else(|| SessionError::NotFound {
                entity: "Asset",
                id: id.to_string(),
            })?;
        self.current = Some(index);
        Ok(&self.assets[index])
    }

    pub fn current(&self) -> Option<&Asset> {
        self.current.and_then(|i| self.assets.get(i))
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn backgrounds(&self) -> &[Asset] {
        &self.backgrounds
    }

    pub fn ids(&self) -> Vec<AssetId> {
        self.assets.iter().map(|a| a.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    // ---- private helpers ----

    /// Run one upload call and check the response covers every file.
    async fn send(
        &self,
        files: Vec<UploadFile>,
    ) -> Result<cutout_service::messages::UploadResponse, SessionError> {
        if files.is_empty() {
            return Err(SessionError::Upload("No files to upload".to_string()));
        }
        let expected = files.len();

        let response = self.service.upload(files).await.map_err(|e| {
            tracing::warn!(error = %e, "Upload rejected");
            SessionError::Upload(e.to_string())
        })?;

        if response.file_ids.len() != expected {
            tracing::warn!(
                expected,
                received = response.file_ids.len(),
                "Upload response does not match request",
            );
            return Err(SessionError::Upload(format!(
                "service returned {} ids for {expected} files",
                response.file_ids.len()
            )));
        }
        Ok(response)
    }
}
