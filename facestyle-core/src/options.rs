use std::path::PathBuf;

use facestyle_utils::config::{
    AlignmentSettings, DEFAULT_DETECTOR_MODEL_PATH, DEFAULT_MODEL_PATH, ExecutionMode,
    StylizerSettings, TensorNormalization,
};

use crate::align::AlignConfig;
use crate::error::StylizerError;
use crate::postprocess::PostprocessConfig;
use crate::preprocess::PreprocessConfig;

/// Everything needed to build a [`FaceStylizer`](crate::FaceStylizer).
#[derive(Debug, Clone)]
pub struct StylizerOptions {
    pub model_path: PathBuf,
    pub detector_model_path: PathBuf,
    pub execution_mode: ExecutionMode,
    pub detector: PreprocessConfig,
    pub detection: PostprocessConfig,
    pub align: AlignConfig,
    pub normalization: TensorNormalization,
}

impl Default for StylizerOptions {
    fn default() -> Self {
        Self::with_model_path(DEFAULT_MODEL_PATH)
    }
}

impl StylizerOptions {
    /// Defaults for everything except the stylizer model.
    pub fn with_model_path(model_path: impl Into<PathBuf>) -> Self {
        let alignment = AlignmentSettings::default();
        Self {
            model_path: model_path.into(),
            detector_model_path: PathBuf::from(DEFAULT_DETECTOR_MODEL_PATH),
            execution_mode: ExecutionMode::default(),
            detector: PreprocessConfig::default(),
            detection: PostprocessConfig::default(),
            align: (&alignment).into(),
            normalization: alignment.normalization,
        }
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), StylizerError> {
        let invalid = |msg: String| Err(StylizerError::InvalidOptions(msg));

        if self.model_path.as_os_str().is_empty() {
            return invalid("model path is empty".into());
        }
        let roi = self.align.roi_scale;
        if !roi.is_finite()
            || !(AlignmentSettings::MIN_ROI_SCALE..=AlignmentSettings::MAX_ROI_SCALE)
                .contains(&roi)
        {
            return invalid(format!(
                "roi_scale {roi} outside {}..={}",
                AlignmentSettings::MIN_ROI_SCALE,
                AlignmentSettings::MAX_ROI_SCALE
            ));
        }
        let score = self.detection.score_threshold;
        if !(0.0..=1.0).contains(&score) {
            return invalid(format!("score_threshold {score} outside 0..=1"));
        }
        let nms = self.detection.nms_threshold;
        if !(0.0..=1.0).contains(&nms) {
            return invalid(format!("nms_threshold {nms} outside 0..=1"));
        }
        let size = self.detector.input_size;
        if size.width == 0 || size.height == 0 {
            return invalid(format!(
                "detector input {}x{} has no pixels",
                size.width, size.height
            ));
        }
        Ok(())
    }
}

impl From<&StylizerSettings> for StylizerOptions {
    fn from(settings: &StylizerSettings) -> Self {
        Self {
            model_path: settings.model_path(),
            detector_model_path: settings.detector_model_path(),
            execution_mode: settings.execution_mode,
            detector: (&settings.input).into(),
            detection: (&settings.detection).into(),
            align: (&settings.alignment).into(),
            normalization: settings.alignment.normalization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let options = StylizerOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(options.execution_mode, ExecutionMode::Copy);
        assert_eq!(options.normalization, TensorNormalization::MinusOneToOne);
    }

    #[test]
    fn model_path_defaults_match_settings_defaults() {
        let from_path = StylizerOptions::with_model_path(DEFAULT_MODEL_PATH);
        let from_settings = StylizerOptions::from(&StylizerSettings::default());
        assert_eq!(from_path.detector, from_settings.detector);
        assert_eq!(from_path.align, from_settings.align);
        assert_eq!(from_path.normalization, from_settings.normalization);
        assert_eq!(
            from_path.detection.score_threshold,
            from_settings.detection.score_threshold
        );
    }

    #[test]
    fn settings_flow_into_options() {
        let mut settings = StylizerSettings::default();
        settings.model_path = Some("custom/style.onnx".into());
        settings.execution_mode = ExecutionMode::ZeroCopy;
        settings.detection.score_threshold = 0.6;
        settings.alignment.roi_scale = 2.0;
        settings.alignment.align_roll = false;
        settings.alignment.normalization = TensorNormalization::ZeroToOne;

        let options = StylizerOptions::from(&settings);
        assert_eq!(options.model_path, PathBuf::from("custom/style.onnx"));
        assert_eq!(options.execution_mode, ExecutionMode::ZeroCopy);
        assert_eq!(options.detection.score_threshold, 0.6);
        assert_eq!(options.align.roi_scale, 2.0);
        assert!(!options.align.align_roll);
        assert_eq!(options.normalization, TensorNormalization::ZeroToOne);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut options = StylizerOptions::with_model_path("style.onnx");
        options.align.roi_scale = 0.5;
        assert!(matches!(
            options.validate(),
            Err(StylizerError::InvalidOptions(_))
        ));

        let mut options = StylizerOptions::with_model_path("style.onnx");
        options.detection.score_threshold = 1.5;
        assert!(options.validate().is_err());

        let mut options = StylizerOptions::with_model_path("style.onnx");
        options.detector.input_size.width = 0;
        assert!(options.validate().is_err());

        assert!(StylizerOptions::with_model_path("").validate().is_err());
    }
}
