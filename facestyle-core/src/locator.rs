use image::RgbaImage;

use crate::error::InferenceError;
use crate::postprocess::{BoundingBox, Detection, Landmark};

/// The face chosen for stylization in one frame.
///
/// Produced once per call and consumed by the crop/alignment step.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRegion {
    pub bbox: BoundingBox,
    /// Right eye, left eye, nose tip, right mouth corner, left mouth corner.
    pub landmarks: [Landmark; 5],
    pub score: f32,
}

impl FaceRegion {
    pub fn right_eye(&self) -> Landmark {
        self.landmarks[0]
    }

    pub fn left_eye(&self) -> Landmark {
        self.landmarks[1]
    }

    /// Roll of the line between the eyes, in radians (0 when level).
    pub fn roll(&self) -> f32 {
        let (r, l) = (self.right_eye(), self.left_eye());
        let (dx, dy) = (l.x - r.x, l.y - r.y);
        if dx == 0.0 && dy == 0.0 {
            0.0
        } else {
            dy.atan2(dx)
        }
    }
}

impl From<&Detection> for FaceRegion {
    fn from(detection: &Detection) -> Self {
        Self {
            bbox: detection.bbox,
            landmarks: detection.landmarks,
            score: detection.score,
        }
    }
}

/// Finds the single most prominent face in an upright frame.
///
/// `Ok(None)` means the frame holds no face, which is a normal outcome. Errors are reserved
/// for detector failures.
pub trait FaceRegionLocator: Send {
    fn locate(&self, image: &RgbaImage) -> Result<Option<FaceRegion>, InferenceError>;
}

impl<F> FaceRegionLocator for F
where
    F: Fn(&RgbaImage) -> Result<Option<FaceRegion>, InferenceError> + Send,
{
    fn locate(&self, image: &RgbaImage) -> Result<Option<FaceRegion>, InferenceError> {
        self(image)
    }
}
