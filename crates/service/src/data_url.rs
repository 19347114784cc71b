//! `data:` URL handling for rendered previews.
//!
//! The service returns previews and masks as
//! `data:image/<fmt>;base64,<payload>` strings.

use base64::{engine::general_purpose, Engine as _};

use crate::service::ServiceError;

/// A raster image carried inline as a data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl(String);

/// The decoded form of a [`DataUrl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// e.g. `image/png`.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// File extension matching the media type.
    pub fn extension(&self) -> &str {
        match self.media_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            other => other.strip_prefix("image/").unwrap_or("bin"),
        }
    }
}

impl DataUrl {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split off the header and base64-decode the payload.
    pub fn decode(&self) -> Result<DecodedImage, ServiceError> {
        let rest = self
            .0
            .strip_prefix("data:")
            .ok_or_else(|| ServiceError::Decode("missing 'data:' prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ServiceError::Decode("missing ',' separator".to_string()))?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| ServiceError::Decode(format!("unsupported encoding in '{header}'")))?;
        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ServiceError::Decode(format!("invalid base64 payload: {e}")))?;
        Ok(DecodedImage {
            media_type: media_type.to_string(),
            bytes,
        })
    }
}
