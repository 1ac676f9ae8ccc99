//! YuNet-backed [`FaceRegionLocator`].

use std::path::Path;

use facestyle_utils::timing_guard;
use image::RgbaImage;
use log::{debug, trace};
use tract_onnx::prelude::{IntoTensor, Tensor, tvec};

use crate::error::{InferenceError, LoadError};
use crate::graph::{RunnableModel, load_runnable};
use crate::locator::{FaceRegion, FaceRegionLocator};
use crate::postprocess::{
    DETECTION_COLS, Detection, PostprocessConfig, apply_postprocess, select_most_prominent,
};
use crate::preprocess::{InputSize, PreprocessConfig, preprocess_for_detector};

const STRIDES: [usize; 3] = [8, 16, 32];
/// cls, obj, bbox, kps
const OUTPUTS_PER_STRIDE: usize = 4;

/// Face locator running the YuNet ONNX detector on the CPU.
#[derive(Debug)]
pub struct YuNetLocator {
    runnable: RunnableModel,
    preprocess: PreprocessConfig,
    postprocess: PostprocessConfig,
}

impl YuNetLocator {
    /// Load the detector graph.
    ///
    /// Symbolic input axes are bound to `preprocess.input_size`; a graph declaring a different
    /// fixed resolution is rejected with [`LoadError::Incompatible`].
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        preprocess: PreprocessConfig,
        postprocess: PostprocessConfig,
    ) -> Result<Self, LoadError> {
        let path = model_path.as_ref();
        let InputSize { width, height } = preprocess.input_size;
        let expected = [1, 3, height as usize, width as usize];
        let runnable = load_runnable(path, "YuNet", |axis| expected.get(axis).copied())?;

        let fact = runnable
            .model()
            .input_fact(0)
            .map_err(|e| LoadError::Incompatible {
                path: path.to_path_buf(),
                reason: format!("unreadable input fact: {e}"),
            })?;
        let disagrees = fact.rank() != expected.len()
            || fact
                .shape
                .iter()
                .zip(expected)
                .any(|(dim, want)| dim.to_i64().is_ok_and(|d| d != want as i64));
        if disagrees {
            return Err(LoadError::Incompatible {
                path: path.to_path_buf(),
                reason: format!(
                    "detector input is {fact:?}, configured for [1,3,{height},{width}]"
                ),
            });
        }

        debug!(
            "YuNet detector {} ready at {}x{}",
            path.display(),
            preprocess.input_size.width,
            preprocess.input_size.height
        );
        Ok(Self {
            runnable,
            preprocess,
            postprocess,
        })
    }

    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    pub fn postprocess_config(&self) -> &PostprocessConfig {
        &self.postprocess
    }

    /// Every face above the score threshold, in source-frame coordinates.
    pub fn detect(&self, image: &RgbaImage) -> Result<Vec<Detection>, InferenceError> {
        let prep = preprocess_for_detector(image, &self.preprocess)?;

        let fused = {
            let _guard = timing_guard("facestyle_core::yunet_inference", log::Level::Debug);
            let outputs = self
                .runnable
                .run(tvec![prep.tensor.into()])
                .map_err(|e| InferenceError::Backend(format!("YuNet execution failed: {e:#}")))?;
            let tensors: Vec<Tensor> = outputs.into_iter().map(|v| v.into_tensor()).collect();
            fuse_outputs(tensors, self.preprocess.input_size)?
        };

        apply_postprocess(&fused, prep.scale_x, prep.scale_y, &self.postprocess)
    }
}

impl FaceRegionLocator for YuNetLocator {
    fn locate(&self, image: &RgbaImage) -> Result<Option<FaceRegion>, InferenceError> {
        let detections = self.detect(image)?;
        let chosen = select_most_prominent(&detections).map(FaceRegion::from);
        trace!(
            "YuNet found {} face(s); selected {:?}",
            detections.len(),
            chosen.as_ref().map(|face| face.bbox)
        );
        Ok(chosen)
    }
}

/// Normalize raw YuNet outputs into one `[N, 15]` tensor.
///
/// Exported graphs either emit the fused tensor directly or the twelve per-stride heads.
fn fuse_outputs(mut tensors: Vec<Tensor>, input_size: InputSize) -> Result<Tensor, InferenceError> {
    match tensors.len() {
        1 => tensors
            .pop()
            .ok_or_else(|| InferenceError::Decode("YuNet model produced no outputs".into())),
        len if len == STRIDES.len() * OUTPUTS_PER_STRIDE => {
            decode_stride_heads(&tensors, input_size)
        }
        other => Err(InferenceError::Decode(format!(
            "unexpected number of YuNet outputs: expected 1 or {}, got {other}",
            STRIDES.len() * OUTPUTS_PER_STRIDE
        ))),
    }
}

fn head<'a>(
    outputs: &'a [Tensor],
    index: usize,
    name: &str,
    expected_len: usize,
) -> Result<&'a [f32], InferenceError> {
    let slice = outputs[index]
        .as_slice::<f32>()
        .map_err(|e| InferenceError::Decode(format!("{name} output not f32: {e}")))?;
    if slice.len() != expected_len {
        return Err(InferenceError::Decode(format!(
            "{name} length mismatch: expected {expected_len}, got {}",
            slice.len()
        )));
    }
    Ok(slice)
}

/// Decode the per-stride classification, objectness, box and keypoint heads.
///
/// Outputs are ordered `cls[8,16,32], obj[8,16,32], bbox[8,16,32], kps[8,16,32]`.
pub(crate) fn decode_stride_heads(
    outputs: &[Tensor],
    input_size: InputSize,
) -> Result<Tensor, InferenceError> {
    let pad_w = (input_size.width as usize).div_ceil(32) * 32;
    let pad_h = (input_size.height as usize).div_ceil(32) * 32;
    let total_cells: usize = STRIDES.iter().map(|s| (pad_w / s) * (pad_h / s)).sum();
    let mut fused = Vec::with_capacity(total_cells * DETECTION_COLS);

    for (stride_index, &stride) in STRIDES.iter().enumerate() {
        let cols = pad_w / stride;
        let rows = pad_h / stride;
        let cells = rows * cols;
        let stride_f = stride as f32;
        let n = STRIDES.len();

        let cls = head(outputs, stride_index, "cls", cells)?;
        let obj = head(outputs, stride_index + n, "obj", cells)?;
        let bbox = head(outputs, stride_index + n * 2, "bbox", cells * 4)?;
        let kps = head(outputs, stride_index + n * 3, "kps", cells * 10)?;

        for row in 0..rows {
            for col in 0..cols {
                let idx = row * cols + col;
                let score = (cls[idx].clamp(0.0, 1.0) * obj[idx].clamp(0.0, 1.0)).sqrt();

                let b = &bbox[idx * 4..idx * 4 + 4];
                let cx = (col as f32 + b[0]) * stride_f;
                let cy = (row as f32 + b[1]) * stride_f;
                let w = b[2].exp() * stride_f;
                let h = b[3].exp() * stride_f;
                fused.extend_from_slice(&[
                    (-0.5f32).mul_add(w, cx),
                    (-0.5f32).mul_add(h, cy),
                    w,
                    h,
                ]);

                for k in kps[idx * 10..idx * 10 + 10].chunks_exact(2) {
                    fused.push((k[0] + col as f32) * stride_f);
                    fused.push((k[1] + row as f32) * stride_f);
                }

                fused.push(if score.is_finite() { score } else { 0.0 });
            }
        }
    }

    Tensor::from_shape(&[total_cells, DETECTION_COLS], &fused)
        .map_err(|e| InferenceError::Decode(format!("failed to build fused YuNet tensor: {e}")))
}
