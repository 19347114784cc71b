//! Processing Service wire messages.
//!
//! Request bodies are camelCase JSON envelopes around a flat option
//! dictionary; [`WireOptions`] flattens [`EditOptions`] into that shape.
//! Response bodies are deserialized into the structs below and converted
//! into domain types at the boundary.

use cutout_core::job::{ArtifactRef, JobState, JobStatus};
use cutout_core::options::{EditOptions, OutputFormat};
use serde::{Deserialize, Serialize};

/// The service's flat option dictionary.
///
/// Gated values (background colour, background image, JPEG quality) are
/// always sent; the service ignores them when their gate is off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireOptions {
    pub background_mode: &'static str,
    pub background_color: String,
    pub background_image_id: Option<String>,
    pub blur_background: u32,
    pub add_shadow: bool,
    pub shadow_offset_x: i32,
    pub shadow_offset_y: i32,
    pub shadow_blur: u32,
    pub shadow_opacity: f32,
    pub add_glow: bool,
    pub glow_radius: u32,
    pub glow_intensity: f32,
    pub glow_color: String,
    pub ar_style: &'static str,
    pub upscale: f32,
    pub output_format: &'static str,
    pub jpg_quality: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_height: Option<u32>,
    pub export_mask: bool,
}

impl From<&EditOptions> for WireOptions {
    fn from(opts: &EditOptions) -> Self {
        // Width and height travel together or not at all.
        let resolution = opts.resolution();
        Self {
            background_mode: opts.background_mode.as_str(),
            background_color: opts.background_color.to_string(),
            background_image_id: opts.background_image_id.as_ref().map(|id| id.to_string()),
            blur_background: opts.blur_background,
            add_shadow: opts.shadow.enabled,
            shadow_offset_x: opts.shadow.offset_x,
            shadow_offset_y: opts.shadow.offset_y,
            shadow_blur: opts.shadow.blur,
            shadow_opacity: opts.shadow.opacity,
            add_glow: opts.glow.enabled,
            glow_radius: opts.glow.radius,
            glow_intensity: opts.glow.intensity,
            glow_color: opts.glow.color.to_string(),
            ar_style: opts.ar_style.as_str(),
            upscale: opts.upscale,
            output_format: match opts.output_format {
                OutputFormat::Png => "PNG",
                OutputFormat::Jpeg => "JPG",
            },
            jpg_quality: opts.jpg_quality,
            output_width: resolution.map(|(w, _)| w),
            output_height: resolution.map(|(_, h)| h),
            export_mask: opts.export_mask,
        }
    }
}

/// Body of `POST /api/preview`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPayload {
    pub file_id: String,
    pub options: WireOptions,
    /// Trade quality for latency.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fast: bool,
}

/// Body of `POST /api/process`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPayload {
    pub file_ids: Vec<String>,
    pub options: WireOptions,
}

/// Response of `POST /api/upload`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_ids: Vec<String>,
    /// Preview of the first file rendered with default options.
    #[serde(default)]
    pub preview: Option<String>,
    /// Segmentation mask of the first file.
    #[serde(default)]
    pub mask: Option<String>,
}

/// Response of `POST /api/preview`.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewResponse {
    pub preview: String,
}

/// Response of `POST /api/process`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub job_id: String,
}

/// Response of `GET /api/job_status/{jobId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobState,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub done: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    /// Archive name, set once the job has finished.
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub files: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl From<JobStatusResponse> for JobStatus {
    fn from(resp: JobStatusResponse) -> Self {
        Self {
            state: resp.status,
            progress: resp.progress.unwrap_or(0),
            done: resp.done,
            total: resp.total,
            artifact: resp.zip.filter(|z| !z.is_empty()).map(ArtifactRef::new),
            files: resp.files.unwrap_or_default(),
            error: resp.error,
        }
    }
}

/// Error body the service attaches to non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
