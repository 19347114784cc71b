//! Edit options and the single reducer that mutates them.
//!
//! [`EditOptions`] is a value object: every change produces a new value via
//! [`reduce`], and [`OptionsModel`] is the only place that holds the
//! current one. Gated fields (background colour, background image,
//! JPEG quality) are preserved when their gate is switched off so that
//! toggling back restores them.
//!
//! Invalid input never errors at the reducer: an edit carrying an
//! out-of-range or unparseable value leaves the last-known-good value in
//! place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::asset::AssetId;
use crate::error::CoreError;

/* --------------------------------------------------------------------------
   Defaults and limits
   -------------------------------------------------------------------------- */

/// Fully transparent black.
pub const DEFAULT_BACKGROUND_COLOR: &str = "#00000000";

/// Neon cyan, opaque.
pub const DEFAULT_GLOW_COLOR: &str = "#00ffffff";

/// Default JPEG encoder quality.
pub const DEFAULT_JPG_QUALITY: u8 = 95;

/// Largest accepted upscale multiplier.
pub const MAX_UPSCALE: f32 = 8.0;

/* --------------------------------------------------------------------------
   Enumerations
   -------------------------------------------------------------------------- */

/// What replaces the removed background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    #[default]
    Transparent,
    Color,
    Image,
    BlurOnly,
}

impl BackgroundMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transparent => "transparent",
            Self::Color => "color",
            Self::Image => "image",
            Self::BlurOnly => "blur_only",
        }
    }
}

impl FromStr for BackgroundMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transparent" => Ok(Self::Transparent),
            "color" | "colour" => Ok(Self::Color),
            "image" => Ok(Self::Image),
            "blur-only" | "blur_only" | "blur" => Ok(Self::BlurOnly),
            other => Err(CoreError::Validation(format!(
                "Unknown background mode '{other}'. Must be one of: transparent, color, image, blur-only"
            ))),
        }
    }
}

/// Stylised overlay applied after the other effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArStyle {
    #[default]
    None,
    Bokeh,
    Neon,
    Holo,
}

impl ArStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bokeh => "bokeh",
            Self::Neon => "neon",
            Self::Holo => "holo",
        }
    }
}

impl FromStr for ArStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "bokeh" => Ok(Self::Bokeh),
            "neon" => Ok(Self::Neon),
            "holo" => Ok(Self::Holo),
            other => Err(CoreError::Validation(format!(
                "Unknown AR style '{other}'. Must be one of: none, bokeh, neon, holo"
            ))),
        }
    }
}

/// Encoding of exported images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(CoreError::Validation(format!(
                "Unknown output format '{other}'. Must be one of: PNG, JPEG"
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => f.write_str("PNG"),
            Self::Jpeg => f.write_str("JPEG"),
        }
    }
}

/* --------------------------------------------------------------------------
   Colour
   -------------------------------------------------------------------------- */

/// An RGBA colour normalised to lowercase `#rrggbbaa`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbaColor(String);

impl RgbaColor {
    /// Parse `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    ///
    /// Six-digit colours are widened with an opaque `ff` alpha.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let hex = input.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::Validation(format!(
                "Colour '{input}' contains non-hex characters"
            )));
        }
        match hex.len() {
            6 => Ok(Self(format!("#{}ff", hex.to_ascii_lowercase()))),
            8 => Ok(Self(format!("#{}", hex.to_ascii_lowercase()))),
            n => Err(CoreError::Validation(format!(
                "Colour '{input}' must have 6 or 8 hex digits, got {n}"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(r, g, b, a)` channels.
    pub fn channels(&self) -> (u8, u8, u8, u8) {
        let byte = |i: usize| u8::from_str_radix(&self.0[1 + 2 * i..3 + 2 * i], 16).unwrap_or(0);
        (byte(0), byte(1), byte(2), byte(3))
    }
}

impl TryFrom<String> for RgbaColor {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RgbaColor> for String {
    fn from(value: RgbaColor) -> Self {
        value.0
    }
}

impl fmt::Display for RgbaColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/* --------------------------------------------------------------------------
   Option records
   -------------------------------------------------------------------------- */

/// Drop shadow cast by the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowOptions {
    pub enabled: bool,
    pub offset_x: i32,
    pub offset_y: i32,
    pub blur: u32,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
}

impl Default for ShadowOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            offset_x: 20,
            offset_y: 20,
            blur: 40,
            opacity: 0.5,
        }
    }
}

/// Outline glow around the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlowOptions {
    pub enabled: bool,
    pub radius: u32,
    /// Intensity in `[0, 1]`.
    pub intensity: f32,
    pub color: RgbaColor,
}

impl Default for GlowOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 20,
            intensity: 0.6,
            color: RgbaColor(DEFAULT_GLOW_COLOR.to_string()),
        }
    }
}

/// The full set of visual-effect parameters applied to an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOptions {
    pub background_mode: BackgroundMode,
    /// Used only when `background_mode` is [`BackgroundMode::Color`].
    pub background_color: RgbaColor,
    /// Used only when `background_mode` is [`BackgroundMode::Image`].
    pub background_image_id: Option<AssetId>,
    pub blur_background: u32,
    pub shadow: ShadowOptions,
    pub glow: GlowOptions,
    pub ar_style: ArStyle,
    pub upscale: f32,
    pub output_format: OutputFormat,
    /// Used only when `output_format` is [`OutputFormat::Jpeg`].
    pub jpg_quality: u8,
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,
    pub export_mask: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            background_mode: BackgroundMode::default(),
            background_color: RgbaColor(DEFAULT_BACKGROUND_COLOR.to_string()),
            background_image_id: None,
            blur_background: 0,
            shadow: ShadowOptions::default(),
            glow: GlowOptions::default(),
            ar_style: ArStyle::default(),
            upscale: 1.0,
            output_format: OutputFormat::default(),
            jpg_quality: DEFAULT_JPG_QUALITY,
            output_width: None,
            output_height: None,
            export_mask: false,
        }
    }
}

impl EditOptions {
    /// Explicit target resolution, present only when both dimensions are set.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        match (self.output_width, self.output_height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    /// Background colour if the current mode uses it.
    pub fn effective_background_color(&self) -> Option<&RgbaColor> {
        (self.background_mode == BackgroundMode::Color).then_some(&self.background_color)
    }

    /// Background image if the current mode uses it.
    pub fn effective_background_image(&self) -> Option<&AssetId> {
        match self.background_mode {
            BackgroundMode::Image => self.background_image_id.as_ref(),
            _ => None,
        }
    }

    /// JPEG quality if the output format uses it.
    pub fn effective_jpg_quality(&self) -> Option<u8> {
        (self.output_format == OutputFormat::Jpeg).then_some(self.jpg_quality)
    }
}

/* --------------------------------------------------------------------------
   Edits
   -------------------------------------------------------------------------- */

/// A single operator edit.
///
/// Numeric payloads are carried wide (`i64`/`f64`) so that out-of-range
/// input reaches the reducer and is rejected there rather than wrapping.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsEdit {
    BackgroundMode(BackgroundMode),
    BackgroundColor(String),
    BackgroundImage(Option<AssetId>),
    BlurBackground(i64),
    ShadowEnabled(bool),
    ShadowOffset { x: i64, y: i64 },
    ShadowBlur(i64),
    ShadowOpacity(f64),
    GlowEnabled(bool),
    GlowRadius(i64),
    GlowIntensity(f64),
    GlowColor(String),
    ArStyle(ArStyle),
    Upscale(f64),
    OutputFormat(OutputFormat),
    JpgQuality(i64),
    /// Set both dimensions at once, or clear both with `None`.
    Resolution(Option<(u32, u32)>),
    OutputWidth(Option<u32>),
    OutputHeight(Option<u32>),
    ExportMask(bool),
}

/// Option keys accepted by [`OptionsEdit::parse`].
pub const OPTION_KEYS: &[&str] = &[
    "background_mode",
    "background_color",
    "background_image_id",
    "blur_background",
    "shadow",
    "shadow_offset",
    "shadow_blur",
    "shadow_opacity",
    "glow",
    "glow_radius",
    "glow_intensity",
    "glow_color",
    "ar_style",
    "upscale",
    "output_format",
    "jpg_quality",
    "resolution",
    "output_width",
    "output_height",
    "export_mask",
];

impl OptionsEdit {
    /// Build an edit from a raw `key` / `value` pair as typed by the operator.
    ///
    /// Only the syntax is checked here; range checks happen in [`reduce`].
    pub fn parse(key: &str, value: &str) -> Result<Self, CoreError> {
        let value = value.trim();
        let edit = match key.trim() {
            "background_mode" => Self::BackgroundMode(value.parse()?),
            "background_color" => Self::BackgroundColor(value.to_string()),
            "background_image_id" => Self::BackgroundImage(parse_optional(value).map(AssetId::new)),
            "blur_background" => Self::BlurBackground(parse_int(key, value)?),
            "shadow" => Self::ShadowEnabled(parse_bool(key, value)?),
            "shadow_offset" => {
                let (x, y) = parse_pair(key, value)?;
                Self::ShadowOffset { x, y }
            }
            "shadow_blur" => Self::ShadowBlur(parse_int(key, value)?),
            "shadow_opacity" => Self::ShadowOpacity(parse_float(key, value)?),
            "glow" => Self::GlowEnabled(parse_bool(key, value)?),
            "glow_radius" => Self::GlowRadius(parse_int(key, value)?),
            "glow_intensity" => Self::GlowIntensity(parse_float(key, value)?),
            "glow_color" => Self::GlowColor(value.to_string()),
            "ar_style" => Self::ArStyle(value.parse()?),
            "upscale" => Self::Upscale(parse_float(key, value.trim_end_matches('x'))?),
            "output_format" => Self::OutputFormat(value.parse()?),
            "jpg_quality" => Self::JpgQuality(parse_int(key, value)?),
            "resolution" => match parse_optional(value) {
                None => Self::Resolution(None),
                Some(raw) => {
                    let (w, h) = parse_pair(key, &raw.replace('x', ","))?;
                    Self::Resolution(Some((to_dimension(key, w)?, to_dimension(key, h)?)))
                }
            },
            "output_width" => Self::OutputWidth(parse_dimension(key, value)?),
            "output_height" => Self::OutputHeight(parse_dimension(key, value)?),
            "export_mask" => Self::ExportMask(parse_bool(key, value)?),
            other => {
                return Err(CoreError::Validation(format!(
                    "Unknown option '{other}'. Valid options: {}",
                    OPTION_KEYS.join(", ")
                )))
            }
        };
        Ok(edit)
    }
}

/// Apply one edit to `options`, returning the new value.
///
/// Values outside their domain keep the previous value. Switching a gate
/// (background mode, output format) never touches the fields it gates.
pub fn reduce(options: &EditOptions, edit: OptionsEdit) -> EditOptions {
    let mut next = options.clone();
    match edit {
        OptionsEdit::BackgroundMode(mode) => next.background_mode = mode,
        OptionsEdit::BackgroundColor(raw) => {
            if let Ok(color) = RgbaColor::parse(&raw) {
                next.background_color = color;
            }
        }
        OptionsEdit::BackgroundImage(id) => next.background_image_id = id,
        OptionsEdit::BlurBackground(radius) => {
            if let Ok(radius) = u32::try_from(radius) {
                next.blur_background = radius;
            }
        }
        OptionsEdit::ShadowEnabled(enabled) => next.shadow.enabled = enabled,
        OptionsEdit::ShadowOffset { x, y } => {
            if let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) {
                next.shadow.offset_x = x;
                next.shadow.offset_y = y;
            }
        }
        OptionsEdit::ShadowBlur(blur) => {
            if let Ok(blur) = u32::try_from(blur) {
                next.shadow.blur = blur;
            }
        }
        OptionsEdit::ShadowOpacity(opacity) => {
            if let Some(opacity) = unit_interval(opacity) {
                next.shadow.opacity = opacity;
            }
        }
        OptionsEdit::GlowEnabled(enabled) => next.glow.enabled = enabled,
        OptionsEdit::GlowRadius(radius) => {
            if let Ok(radius) = u32::try_from(radius) {
                next.glow.radius = radius;
            }
        }
        OptionsEdit::GlowIntensity(intensity) => {
            if let Some(intensity) = unit_interval(intensity) {
                next.glow.intensity = intensity;
            }
        }
        OptionsEdit::GlowColor(raw) => {
            if let Ok(color) = RgbaColor::parse(&raw) {
                next.glow.color = color;
            }
        }
        OptionsEdit::ArStyle(style) => next.ar_style = style,
        OptionsEdit::Upscale(factor) => {
            if factor.is_finite() && factor > 0.0 && factor <= f64::from(MAX_UPSCALE) {
                next.upscale = factor as f32;
            }
        }
        OptionsEdit::OutputFormat(format) => next.output_format = format,
        OptionsEdit::JpgQuality(quality) => {
            if (1..=100).contains(&quality) {
                next.jpg_quality = quality as u8;
            }
        }
        OptionsEdit::Resolution(Some((w, h))) => {
            if w > 0 && h > 0 {
                next.output_width = Some(w);
                next.output_height = Some(h);
            }
        }
        OptionsEdit::Resolution(None) => {
            next.output_width = None;
            next.output_height = None;
        }
        OptionsEdit::OutputWidth(w) => next.output_width = w.filter(|&w| w > 0),
        OptionsEdit::OutputHeight(h) => next.output_height = h.filter(|&h| h > 0),
        OptionsEdit::ExportMask(enabled) => next.export_mask = enabled,
    }
    next
}

/* --------------------------------------------------------------------------
   OptionsModel
   -------------------------------------------------------------------------- */

/// Holder of the current [`EditOptions`].
///
/// Owned by the orchestration layer; readers only ever see snapshots.
#[derive(Debug, Default)]
pub struct OptionsModel {
    current: EditOptions,
    revision: u64,
}

impl OptionsModel {
    pub fn new(initial: EditOptions) -> Self {
        Self {
            current: initial,
            revision: 0,
        }
    }

    /// Merge a batch of edits. Returns `true` if the options changed.
    pub fn set(&mut self, edits: impl IntoIterator<Item = OptionsEdit>) -> bool {
        let next = edits
            .into_iter()
            .fold(self.current.clone(), |acc, edit| reduce(&acc, edit));
        if next == self.current {
            return false;
        }
        self.current = next;
        self.revision += 1;
        true
    }

    /// Immutable copy of the current options.
    pub fn snapshot(&self) -> EditOptions {
        self.current.clone()
    }

    pub fn current(&self) -> &EditOptions {
        &self.current
    }

    /// Number of effective changes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

// ---- private helpers ----

fn unit_interval(value: f64) -> Option<f32> {
    (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(value as f32)
}

fn parse_optional(value: &str) -> Option<String> {
    match value {
        "" | "none" | "null" | "-" => None,
        other => Some(other.to_string()),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CoreError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(CoreError::Validation(format!(
            "Option '{key}' expects on/off, got '{value}'"
        ))),
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, CoreError> {
    value.parse().map_err(|_| {
        CoreError::Validation(format!("Option '{key}' expects an integer, got '{value}'"))
    })
}

fn parse_float(key: &str, value: &str) -> Result<f64, CoreError> {
    value.parse().map_err(|_| {
        CoreError::Validation(format!("Option '{key}' expects a number, got '{value}'"))
    })
}

fn parse_pair(key: &str, value: &str) -> Result<(i64, i64), CoreError> {
    let (a, b) = value.split_once(',').ok_or_else(|| {
        CoreError::Validation(format!("Option '{key}' expects two values, got '{value}'"))
    })?;
    Ok((parse_int(key, a.trim())?, parse_int(key, b.trim())?))
}

fn to_dimension(key: &str, value: i64) -> Result<u32, CoreError> {
    u32::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| {
            CoreError::Validation(format!("Option '{key}' expects positive pixels, got {value}"))
        })
}

fn parse_dimension(key: &str, value: &str) -> Result<Option<u32>, CoreError> {
    match parse_optional(value) {
        None => Ok(None),
        Some(raw) => to_dimension(key, parse_int(key, &raw)?).map(Some),
    }
}

/* --------------------------------------------------------------------------
   Tests
   -------------------------------------------------------------------------- */
