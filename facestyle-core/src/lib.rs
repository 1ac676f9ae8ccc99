//! On-device face stylization.
//!
//! A [`FaceStylizer`] takes a camera frame, finds the most prominent face with a
//! [`FaceRegionLocator`], crops and levels it, runs it through a [`ModelRunner`], and returns
//! the stylized face at the model's output resolution. Both models run on the CPU with
//! `tract-onnx`.

/// Face crop and roll alignment.
pub mod align;
/// YuNet face detection backend.
pub mod detector;
/// Error taxonomy.
pub mod error;
#[cfg(test)]
mod fixtures;
mod graph;
/// Caller-facing pixel buffers.
pub mod image_frame;
/// Face locator abstraction.
pub mod locator;
/// Stylizer model loading and execution.
pub mod model;
/// Pipeline construction options.
pub mod options;
/// Detection post-processing (NMS, score filtering, face selection).
pub mod postprocess;
/// Detector input preparation.
pub mod preprocess;
/// The stylization pipeline.
pub mod stylizer;
/// Image and tensor conversions.
pub mod tensor;

pub use align::{AlignConfig, align_face};
pub use detector::YuNetLocator;
pub use error::{InferenceError, LoadError, StylizerError};
pub use image_frame::{ImageFrame, PixelFormat, Rotation};
pub use locator::{FaceRegion, FaceRegionLocator};
pub use model::{ModelRunner, StylizerModel, TensorLayout, TensorSpec};
pub use options::StylizerOptions;
pub use postprocess::{
    BoundingBox, Detection, Landmark, PostprocessConfig, apply_postprocess, select_most_prominent,
};
pub use preprocess::{InputSize, PreprocessConfig, PreprocessOutput, preprocess_for_detector};
pub use stylizer::{FaceStylizer, Stage, StylizationResult};
pub use tensor::{image_to_tensor, tensor_to_rgba};

pub use facestyle_utils::config::{ExecutionMode, TensorNormalization};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
