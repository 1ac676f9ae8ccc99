//! Outline the stylized face region on the source image.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use facestyle_core::{BoundingBox, FaceRegion};
use image::{Rgba, RgbaImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};

const RECT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const LANDMARK_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const EYE_LINE_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);

/// Draw `region` onto an upright copy of the input and save it into `output_dir`.
pub fn annotate_image(
    image: &RgbaImage,
    region: &FaceRegion,
    source_path: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let (img_w, img_h) = image.dimensions();
    if img_w == 0 || img_h == 0 {
        anyhow::bail!(
            "cannot annotate image with zero dimensions: {}",
            source_path.display()
        );
    }

    let mut canvas = image.clone();
    draw_hollow_rect_mut(&mut canvas, rect_from_bbox(&region.bbox, img_w, img_h), RECT_COLOR);
    let (right, left) = (region.right_eye(), region.left_eye());
    draw_line_segment_mut(&mut canvas, (right.x, right.y), (left.x, left.y), EYE_LINE_COLOR);
    for lm in &region.landmarks {
        let cx = clamp_to_i32(lm.x, img_w);
        let cy = clamp_to_i32(lm.y, img_h);
        draw_filled_circle_mut(&mut canvas, (cx, cy), 2, LANDMARK_COLOR);
    }

    let output_path = facestyle_utils::derive_output_path(source_path, output_dir, "_face", "png");
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    canvas
        .save(&output_path)
        .with_context(|| format!("failed to save annotated image {}", output_path.display()))?;
    Ok(output_path)
}

/// Convert a floating-point `BoundingBox` to an integer `imageproc::rect::Rect`.
fn rect_from_bbox(bbox: &BoundingBox, img_w: u32, img_h: u32) -> Rect {
    let max_x = (img_w - 1) as f32;
    let max_y = (img_h - 1) as f32;

    let x1 = bbox.x.clamp(0.0, max_x);
    let y1 = bbox.y.clamp(0.0, max_y);
    let x2 = (bbox.x + bbox.width).clamp(0.0, max_x);
    let y2 = (bbox.y + bbox.height).clamp(0.0, max_y);

    let width = (x2 - x1).max(1.0).round() as u32;
    let height = (y2 - y1).max(1.0).round() as u32;

    Rect::at(x1.round() as i32, y1.round() as i32).of_size(width, height)
}

#[inline]
fn clamp_to_i32(value: f32, max_extent: u32) -> i32 {
    if max_extent == 0 {
        return 0;
    }
    let max = (max_extent - 1) as f32;
    value.clamp(0.0, max).round() as i32
}
