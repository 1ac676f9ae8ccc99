use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage, RgbaImage, imageops::FilterType};
use ndarray::Array3;

use crate::config::TensorNormalization;

/// Load an image from disk into memory.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Resize an RGBA image to the requested resolution and drop the alpha channel.
pub fn resize_to_rgb(image: &RgbaImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    let resized = image::imageops::resize(image, width, height, filter);
    DynamicImage::ImageRgba8(resized).to_rgb8()
}

/// Convert an RGB image into a BGR CHW array with values matching OpenCV's `blobFromImage`.
///
/// YuNet was trained on OpenCV blobs, so channels are swapped and left in `0..=255`.
pub fn rgb_to_bgr_chw(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        array[(0, yi, xi)] = pixel[2] as f32;
        array[(1, yi, xi)] = pixel[1] as f32;
        array[(2, yi, xi)] = pixel[0] as f32;
    }
    array
}

/// Convert an RGBA image into a normalized RGB array, channels first (`[3, H, W]`).
pub fn rgba_to_rgb_chw(image: &RgbaImage, normalization: TensorNormalization) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        for c in 0..3 {
            array[(c, yi, xi)] = normalization.normalize(pixel[c]);
        }
    }
    array
}

/// Convert an RGBA image into a normalized RGB array, channels last (`[H, W, 3]`).
pub fn rgba_to_rgb_hwc(image: &RgbaImage, normalization: TensorNormalization) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((height as usize, width as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        for c in 0..3 {
            array[(yi, xi, c)] = normalization.normalize(pixel[c]);
        }
    }
    array
}

/// Compute scale factors used to reproject detections from model space to original space.
pub fn compute_resize_scales(original: (u32, u32), target: (u32, u32)) -> Result<(f32, f32)> {
    let (orig_w, orig_h) = original;
    let (target_w, target_h) = target;
    anyhow::ensure!(
        target_w > 0 && target_h > 0,
        "target dimensions must be non-zero"
    );
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "original dimensions must be non-zero"
    );
    Ok((
        orig_w as f32 / target_w as f32,
        orig_h as f32 / target_h as f32,
    ))
}
