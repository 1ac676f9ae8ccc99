//! Shared configuration types consumed across the facestyle workspace.
//!
//! These structures describe the stylizer model, the face detector that feeds it, and the
//! output/telemetry preferences. They serialize to JSON so the CLI can load them from disk.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Default location of the stylizer ONNX model.
pub const DEFAULT_MODEL_PATH: &str = "models/face_stylizer.onnx";
/// Default location of the YuNet face detector ONNX model.
pub const DEFAULT_DETECTOR_MODEL_PATH: &str = "models/face_detection_yunet_2023mar_640.onnx";

/// Shared detection parameters that should mirror YuNet defaults.
///
/// These settings directly control the behavior of the post-processing steps,
/// such as non-maximum suppression (NMS) and score filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum confidence score for a detection to be considered valid.
    pub score_threshold: f32,
    /// Threshold for non-maximum suppression to merge overlapping bounding boxes.
    pub nms_threshold: f32,
    /// The maximum number of detections to keep before NMS.
    pub top_k: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            score_threshold: 0.9,
            nms_threshold: 0.3,
            top_k: 5_000,
        }
    }
}

/// Resize filter preference for the detector input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// Preserve visual quality when resizing (default, Triangle filter).
    #[default]
    Quality,
    /// Prioritize throughput (Nearest filter).
    Speed,
}

impl fmt::Display for ResizeQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResizeQuality::Quality => "quality",
            ResizeQuality::Speed => "speed",
        })
    }
}

impl FromStr for ResizeQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quality" => Ok(ResizeQuality::Quality),
            "speed" => Ok(ResizeQuality::Speed),
            other => Err(format!(
                "invalid resize quality '{other}'; expected 'quality' or 'speed'"
            )),
        }
    }
}

/// Face detector input resolution in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InputDimensions {
    pub width: u32,
    pub height: u32,
    /// Choose between quality-focused or speed-focused resizing.
    pub resize_quality: ResizeQuality,
}

impl Default for InputDimensions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
            resize_quality: ResizeQuality::Speed,
        }
    }
}

/// How the completion-style stylize call hands its result to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// The handler receives a heap copy it may keep.
    #[default]
    Copy,
    /// The handler receives a view over pipeline scratch memory, valid only inside the handler.
    ZeroCopy,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionMode::Copy => "copy",
            ExecutionMode::ZeroCopy => "zero_copy",
        })
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "copy" => Ok(ExecutionMode::Copy),
            "zero_copy" | "zerocopy" => Ok(ExecutionMode::ZeroCopy),
            other => Err(format!(
                "invalid execution mode '{other}'; expected 'copy' or 'zero_copy'"
            )),
        }
    }
}

/// Value range the stylizer model expects for its input and produces on its output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TensorNormalization {
    /// Channels mapped to `0.0..=1.0`.
    ZeroToOne,
    /// Channels mapped to `-1.0..=1.0`.
    #[default]
    MinusOneToOne,
}

impl TensorNormalization {
    /// Map an 8-bit channel value into the model range.
    #[inline]
    pub fn normalize(self, value: u8) -> f32 {
        let unit = value as f32 / 255.0;
        match self {
            TensorNormalization::ZeroToOne => unit,
            TensorNormalization::MinusOneToOne => unit.mul_add(2.0, -1.0),
        }
    }

    /// Map a model-range value back to an 8-bit channel, clamping out-of-range values.
    #[inline]
    pub fn denormalize(self, value: f32) -> u8 {
        let unit = match self {
            TensorNormalization::ZeroToOne => value,
            TensorNormalization::MinusOneToOne => (value + 1.0) * 0.5,
        };
        if !unit.is_finite() {
            return 0;
        }
        (unit * 255.0).round().clamp(0.0, 255.0) as u8
    }
}

impl FromStr for TensorNormalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "zero_to_one" | "unit" => Ok(TensorNormalization::ZeroToOne),
            "minus_one_to_one" | "signed" => Ok(TensorNormalization::MinusOneToOne),
            other => Err(format!(
                "invalid normalization '{other}'; expected 'zero_to_one' or 'minus_one_to_one'"
            )),
        }
    }
}

/// Face alignment and tensor preparation parameters for the stylizer input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignmentSettings {
    /// Side of the square crop relative to the larger face box side.
    pub roi_scale: f32,
    /// Rotate the crop so the eyes are level.
    pub align_roll: bool,
    /// Value range of the stylizer tensors.
    pub normalization: TensorNormalization,
}

impl AlignmentSettings {
    pub const MIN_ROI_SCALE: f32 = 1.0;
    pub const MAX_ROI_SCALE: f32 = 4.0;

    /// Clamp values to sensible ranges.
    pub fn sanitize(&mut self) {
        if !self.roi_scale.is_finite() {
            self.roi_scale = Self::default().roi_scale;
        }
        self.roi_scale = self
            .roi_scale
            .clamp(Self::MIN_ROI_SCALE, Self::MAX_ROI_SCALE);
    }
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            roi_scale: 1.5,
            align_roll: true,
            normalization: TensorNormalization::default(),
        }
    }
}

/// Output encoding preferences for stylized images written to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    /// Output format: "png" or "jpeg".
    pub format: String,
    /// JPEG quality (1-100, only used when format is jpeg).
    pub jpeg_quality: u8,
    /// Infer the format from the output file extension when it is recognized.
    pub auto_detect_format: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: "png".to_string(),
            jpeg_quality: 90,
            auto_detect_format: true,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }

    /// Update the level string from a `LevelFilter` value.
    pub fn set_level(&mut self, level: LevelFilter) {
        self.level = level.as_str().to_ascii_lowercase();
    }
}

/// Persistent stylizer settings.
///
/// Aggregates every user-configurable parameter so a single JSON file can describe a
/// complete pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylizerSettings {
    /// Path to the stylizer ONNX model. Falls back to [`DEFAULT_MODEL_PATH`].
    pub model_path: Option<String>,
    /// Path to the YuNet detector model. Falls back to [`DEFAULT_DETECTOR_MODEL_PATH`].
    pub detector_model_path: Option<String>,
    /// Result hand-off for the completion-style call.
    pub execution_mode: ExecutionMode,
    /// Detector input dimensions.
    pub input: InputDimensions,
    /// Detector post-processing.
    pub detection: DetectionSettings,
    /// Crop/alignment and tensor range for the stylizer.
    pub alignment: AlignmentSettings,
    /// Encoding of written results.
    pub output: OutputSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl Default for StylizerSettings {
    fn default() -> Self {
        Self {
            model_path: Some(DEFAULT_MODEL_PATH.into()),
            detector_model_path: Some(DEFAULT_DETECTOR_MODEL_PATH.into()),
            execution_mode: ExecutionMode::default(),
            input: InputDimensions::default(),
            detection: DetectionSettings::default(),
            alignment: AlignmentSettings::default(),
            output: OutputSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl StylizerSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing model paths fall back to the defaults; alignment values are clamped.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: StylizerSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = Some(DEFAULT_MODEL_PATH.into());
        }
        if settings.detector_model_path.is_none() {
            settings.detector_model_path = Some(DEFAULT_DETECTOR_MODEL_PATH.into());
        }
        settings.alignment.sanitize();

        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// Resolved stylizer model path.
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(self.model_path.as_deref().unwrap_or(DEFAULT_MODEL_PATH))
    }

    /// Resolved detector model path.
    pub fn detector_model_path(&self) -> PathBuf {
        PathBuf::from(
            self.detector_model_path
                .as_deref()
                .unwrap_or(DEFAULT_DETECTOR_MODEL_PATH),
        )
    }
}

/// Returns the default path for persisted settings (`config/facestyle.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/facestyle.json"))
        .unwrap_or_else(|_| PathBuf::from("config/facestyle.json"))
}
