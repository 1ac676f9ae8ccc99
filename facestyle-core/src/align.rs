//! Face crop and roll alignment for the stylizer input.
//!
//! A square region around the located face is rotated so the eyes are level, scaled to the
//! model input resolution, and letterboxed when that resolution is not square. Anything the
//! region covers outside the source frame comes out as transparent black.

use facestyle_utils::{config::AlignmentSettings, timing_guard};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::error::InferenceError;
use crate::locator::FaceRegion;

const FILL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Geometry knobs for the face crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignConfig {
    /// Square side relative to the larger side of the face box.
    pub roi_scale: f32,
    /// Level the eye line before cropping.
    pub align_roll: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        (&AlignmentSettings::default()).into()
    }
}

impl From<&AlignmentSettings> for AlignConfig {
    fn from(settings: &AlignmentSettings) -> Self {
        Self {
            roi_scale: settings.roi_scale,
            align_roll: settings.align_roll,
        }
    }
}

/// Source-space square the crop samples from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSquare {
    pub center_x: f32,
    pub center_y: f32,
    pub side: f32,
    /// Radians; the crop is rotated by `-angle` to level it.
    pub angle: f32,
}

impl CropSquare {
    pub fn for_face(face: &FaceRegion, config: &AlignConfig) -> Result<Self, InferenceError> {
        let (center_x, center_y) = face.bbox.center();
        let side = face.bbox.width.max(face.bbox.height) * config.roi_scale;
        if !side.is_finite() || side <= 0.0 || !center_x.is_finite() || !center_y.is_finite() {
            return Err(InferenceError::Preprocess(format!(
                "degenerate face region {:?}",
                face.bbox
            )));
        }
        let angle = if config.align_roll { face.roll() } else { 0.0 };
        Ok(Self {
            center_x,
            center_y,
            side,
            angle,
        })
    }

    /// Row-major affine matrix mapping source pixels onto an `out_w x out_h` canvas.
    fn projection_matrix(&self, out_w: u32, out_h: u32) -> [f32; 9] {
        let scale = out_w.min(out_h) as f32 / self.side;
        let (sin, cos) = self.angle.sin_cos();
        let (a, b) = (scale * cos, scale * sin);
        let (cx, cy) = (self.center_x, self.center_y);
        let (ox, oy) = (out_w as f32 * 0.5, out_h as f32 * 0.5);
        [
            a,
            b,
            ox - (a * cx + b * cy),
            -b,
            a,
            oy - (a * cy - b * cx),
            0.0,
            0.0,
            1.0,
        ]
    }
}

/// Crop `face` out of an upright frame at exactly `out_w x out_h`.
pub fn align_face(
    image: &RgbaImage,
    face: &FaceRegion,
    config: &AlignConfig,
    out_w: u32,
    out_h: u32,
) -> Result<RgbaImage, InferenceError> {
    let _guard = timing_guard("facestyle_core::align_face", log::Level::Trace);
    if out_w == 0 || out_h == 0 {
        return Err(InferenceError::Preprocess(format!(
            "model input {out_w}x{out_h} has no pixels"
        )));
    }

    let square = CropSquare::for_face(face, config)?;
    let projection = Projection::from_matrix(square.projection_matrix(out_w, out_h))
        .ok_or_else(|| InferenceError::Preprocess("face crop transform is singular".into()))?;

    let mut out = RgbaImage::from_pixel(out_w, out_h, FILL);
    warp_into(image, &projection, Interpolation::Bilinear, FILL, &mut out);
    letterbox(&mut out);
    Ok(out)
}

/// Clear everything outside the centered square of side `min(w, h)`.
fn letterbox(image: &mut RgbaImage) {
    let (w, h) = image.dimensions();
    if w == h {
        return;
    }
    let side = w.min(h);
    let (x0, y0) = ((w - side) / 2, (h - side) / 2);
    let (x1, y1) = (x0 + side, y0 + side);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x < x0 || x >= x1 || y < y0 || y >= y1 {
            *pixel = FILL;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::{BoundingBox, Landmark};

    fn face(x: f32, y: f32, size: f32, eyes: [(f32, f32); 2]) -> FaceRegion {
        let mut landmarks = [Landmark { x, y }; 5];
        landmarks[0] = Landmark {
            x: eyes[0].0,
            y: eyes[0].1,
        };
        landmarks[1] = Landmark {
            x: eyes[1].0,
            y: eyes[1].1,
        };
        FaceRegion {
            bbox: BoundingBox {
                x,
                y,
                width: size,
                height: size,
            },
            landmarks,
            score: 0.95,
        }
    }

    fn level_face(x: f32, y: f32, size: f32) -> FaceRegion {
        let eye_y = y + size * 0.4;
        face(x, y, size, [(x + size * 0.3, eye_y), (x + size * 0.7, eye_y)])
    }

    fn red() -> Rgba<u8> {
        Rgba([255, 0, 0, 255])
    }

    #[test]
    fn output_matches_requested_size() {
        let image = RgbaImage::from_pixel(100, 80, red());
        let out = align_face(&image, &level_face(30.0, 20.0, 30.0), &AlignConfig::default(), 64, 48)
            .expect("align");
        assert_eq!(out.dimensions(), (64, 48));
    }

    #[test]
    fn interior_face_fills_the_crop() {
        let image = RgbaImage::from_pixel(100, 100, red());
        let out = align_face(&image, &level_face(40.0, 40.0, 20.0), &AlignConfig::default(), 30, 30)
            .expect("align");
        assert_eq!(*out.get_pixel(15, 15), red());
        assert_eq!(*out.get_pixel(2, 2), red());
        assert_eq!(*out.get_pixel(27, 27), red());
    }

    #[test]
    fn crop_past_the_frame_edge_is_transparent() {
        let image = RgbaImage::from_pixel(100, 100, red());
        let out = align_face(&image, &level_face(0.0, 0.0, 20.0), &AlignConfig::default(), 30, 30)
            .expect("align");
        assert_eq!(*out.get_pixel(0, 0), FILL);
        assert_eq!(*out.get_pixel(15, 15), red());
    }

    #[test]
    fn axis_aligned_crop_keeps_source_orientation() {
        // Left half dark, right half bright.
        let image = RgbaImage::from_fn(100, 100, |x, _| {
            if x < 50 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        });
        let region = level_face(35.0, 35.0, 30.0);
        let config = AlignConfig {
            roi_scale: 1.0,
            align_roll: false,
        };
        let out = align_face(&image, &region, &config, 30, 30).expect("align");
        assert_eq!(out.get_pixel(5, 15).0[0], 0);
        assert_eq!(out.get_pixel(25, 15).0[0], 255);
    }

    #[test]
    fn roll_alignment_levels_a_vertical_eye_line() {
        // Eyes stacked vertically: leveling turns the bright bottom half to the right.
        let image = RgbaImage::from_fn(100, 100, |_, y| {
            if y < 50 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        });
        let tilted = face(35.0, 35.0, 30.0, [(50.0, 40.0), (50.0, 60.0)]);
        let config = AlignConfig {
            roi_scale: 1.0,
            align_roll: true,
        };
        let square = CropSquare::for_face(&tilted, &config).expect("square");
        assert!((square.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);

        let out = align_face(&image, &tilted, &config, 30, 30).expect("align");
        assert_eq!(out.get_pixel(5, 15).0[0], 0);
        assert_eq!(out.get_pixel(25, 15).0[0], 255);
    }

    #[test]
    fn non_square_inputs_are_letterboxed() {
        let image = RgbaImage::from_pixel(200, 200, red());
        let out = align_face(&image, &level_face(80.0, 80.0, 40.0), &AlignConfig::default(), 40, 20)
            .expect("align");
        assert_eq!(*out.get_pixel(0, 10), FILL);
        assert_eq!(*out.get_pixel(39, 10), FILL);
        assert_eq!(*out.get_pixel(20, 10), red());
    }

    #[test]
    fn degenerate_regions_are_rejected() {
        let image = RgbaImage::from_pixel(10, 10, red());
        let empty = level_face(5.0, 5.0, 0.0);
        assert!(matches!(
            align_face(&image, &empty, &AlignConfig::default(), 8, 8),
            Err(InferenceError::Preprocess(_))
        ));
        assert!(align_face(&image, &level_face(1.0, 1.0, 4.0), &AlignConfig::default(), 0, 8).is_err());
    }
}
