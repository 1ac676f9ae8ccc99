use std::cmp::Ordering;

use facestyle_utils::config::DetectionSettings;
use tract_onnx::prelude::{Tensor, tract_ndarray::ArrayView2};

use crate::error::InferenceError;

/// Columns per fused YuNet row: bbox (4) + landmarks (10) + score (1).
pub const DETECTION_COLS: usize = 15;

/// Score filtering and suppression applied to raw YuNet rows.
#[derive(Debug, Clone)]
pub struct PostprocessConfig {
    /// Minimum confidence score for a detection to be considered valid.
    pub score_threshold: f32,
    /// IoU above which a lower-scored box is suppressed.
    pub nms_threshold: f32,
    /// The maximum number of candidates kept before NMS (0 keeps all).
    pub top_k: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        (&DetectionSettings::default()).into()
    }
}

impl From<&DetectionSettings> for PostprocessConfig {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            score_threshold: settings.score_threshold,
            nms_threshold: settings.nms_threshold,
            top_k: settings.top_k,
        }
    }
}

/// Axis-aligned bounding box in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.width.mul_add(0.5, self.x),
            self.height.mul_add(0.5, self.y),
        )
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if intersection <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 { 0.0 } else { intersection / union }
    }
}

/// Facial landmark coordinate in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// A single face candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Right eye, left eye, nose tip, right mouth corner, left mouth corner.
    pub landmarks: [Landmark; 5],
    pub score: f32,
}

impl Detection {
    /// Ranking key for picking one face out of many: confidence weighted by size.
    pub fn prominence(&self) -> f32 {
        self.score * self.bbox.area()
    }
}

/// Decode fused YuNet rows into filtered detections in source-image coordinates.
///
/// Rows below the score threshold or with empty boxes are dropped, coordinates are scaled
/// by `(scale_x, scale_y)`, candidates are ranked by score, truncated to `top_k`, and
/// overlapping boxes are suppressed.
pub fn apply_postprocess(
    output: &Tensor,
    scale_x: f32,
    scale_y: f32,
    config: &PostprocessConfig,
) -> Result<Vec<Detection>, InferenceError> {
    let rows = detection_rows(output)?;

    let mut detections: Vec<Detection> = rows
        .rows()
        .into_iter()
        .filter_map(|row| {
            let score = row[14];
            if !score.is_finite() || score < config.score_threshold {
                return None;
            }
            let bbox = BoundingBox {
                x: row[0] * scale_x,
                y: row[1] * scale_y,
                width: row[2] * scale_x,
                height: row[3] * scale_y,
            };
            if bbox.width <= 0.0 || bbox.height <= 0.0 {
                return None;
            }
            let landmarks = std::array::from_fn(|i| Landmark {
                x: row[4 + i * 2] * scale_x,
                y: row[5 + i * 2] * scale_y,
            });
            Some(Detection {
                bbox,
                landmarks,
                score,
            })
        })
        .collect();

    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    if config.top_k > 0 {
        detections.truncate(config.top_k);
    }
    if config.nms_threshold > 0.0 && detections.len() > 1 {
        detections = non_max_suppression(detections, config.nms_threshold);
    }
    Ok(detections)
}

/// Pick the single face to stylize.
///
/// Highest `score × area` wins. Ties go to the larger box, then the box nearer the top,
/// then the box nearer the left edge, so the choice never depends on input order.
pub fn select_most_prominent(detections: &[Detection]) -> Option<&Detection> {
    detections.iter().max_by(|a, b| {
        a.prominence()
            .total_cmp(&b.prominence())
            .then_with(|| a.bbox.area().total_cmp(&b.bbox.area()))
            .then_with(|| b.bbox.y.total_cmp(&a.bbox.y))
            .then_with(|| b.bbox.x.total_cmp(&a.bbox.x))
    })
}

fn detection_rows(output: &Tensor) -> Result<ArrayView2<'_, f32>, InferenceError> {
    let rows = match *output.shape() {
        [rows, DETECTION_COLS] | [1, rows, DETECTION_COLS] => rows,
        _ => {
            return Err(InferenceError::Decode(format!(
                "YuNet output must have shape [N, 15] or [1, N, 15] (got {:?})",
                output.shape()
            )));
        }
    };

    let slice = output
        .as_slice::<f32>()
        .map_err(|e| InferenceError::Decode(format!("YuNet output is not f32: {e}")))?;
    ArrayView2::from_shape((rows, DETECTION_COLS), slice)
        .map_err(|_| InferenceError::Decode("YuNet output data is not contiguous".into()))
}

/// Greedy NMS over score-sorted detections.
fn non_max_suppression(detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if kept
            .iter()
            .all(|k| candidate.bbox.iou(&k.bbox) <= threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}
