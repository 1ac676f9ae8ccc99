use std::path::PathBuf;

use thiserror::Error;

use crate::image_frame::PixelFormat;

/// Failure to bring a model artifact into a runnable state.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to parse ONNX graph from {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("model {} is incompatible: {reason}", path.display())]
    Incompatible { path: PathBuf, reason: String },
}

/// Failure while executing a loaded model.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("failed to prepare model input: {0}")]
    Preprocess(String),

    #[error("model execution failed: {0}")]
    Backend(String),

    #[error("failed to decode model output: {0}")]
    Decode(String),
}

/// Every error the stylizer surfaces to callers.
///
/// A frame without a face is not an error; it yields an empty result.
#[derive(Debug, Error)]
pub enum StylizerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("unsupported pixel format {0:?}; expected Rgba32 or Bgra32")]
    UnsupportedFormat(PixelFormat),

    #[error("invalid image buffer: {0}")]
    InvalidBuffer(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("invalid stylizer options: {0}")]
    InvalidOptions(String),
}

impl StylizerError {
    /// Returns `true` for per-call format rejections.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, StylizerError::UnsupportedFormat(_))
    }
}
