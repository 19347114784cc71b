//! Uploaded source images.
//!
//! An [`Asset`] is created once the Processing Service has accepted an
//! upload and assigned it an opaque identifier. Assets are immutable and
//! never deleted by the client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the Processing Service on upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// An uploaded source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    /// Service-issued identifier.
    pub id: AssetId,
    /// Where the operator's copy of the image came from (file path or
    /// display name). Used only for display.
    pub local_display_ref: String,
}

impl Asset {
    pub fn new(id: AssetId, local_display_ref: impl Into<String>) -> Self {
        Self {
            id,
            local_display_ref: local_display_ref.into(),
        }
    }
}
