//! Detector input preparation.
//!
//! Resizes an upright RGBA frame to the YuNet input resolution, converts it to the BGR CHW
//! layout YuNet was trained on, and records the scale factors that map detections back to
//! the frame.

use facestyle_utils::{
    compute_resize_scales,
    config::{InputDimensions, ResizeQuality},
    resize_to_rgb, rgb_to_bgr_chw, timing_guard,
};
use image::{DynamicImage, RgbImage, RgbaImage, imageops::FilterType};
use tract_onnx::prelude::Tensor;

use crate::error::InferenceError;

/// Desired input resolution for YuNet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::new(640, 640)
    }
}

/// Configuration for preprocessing a frame before detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessConfig {
    pub input_size: InputSize,
    /// Resize filter preference controlling the quality vs speed trade-off.
    pub resize_quality: ResizeQuality,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        (&InputDimensions::default()).into()
    }
}

impl PreprocessConfig {
    fn resize_filter(&self) -> FilterType {
        match self.resize_quality {
            ResizeQuality::Quality => FilterType::Triangle,
            ResizeQuality::Speed => FilterType::Nearest,
        }
    }
}

impl From<&InputDimensions> for PreprocessConfig {
    fn from(dimensions: &InputDimensions) -> Self {
        PreprocessConfig {
            input_size: InputSize::new(dimensions.width, dimensions.height),
            resize_quality: dimensions.resize_quality,
        }
    }
}

/// Detector tensor plus metadata for rescaling detections.
#[derive(Debug)]
pub struct PreprocessOutput {
    /// `[1, 3, H, W]` BGR tensor in `0..=255`.
    pub tensor: Tensor,
    pub scale_x: f32,
    pub scale_y: f32,
    pub original_size: (u32, u32),
}

/// Convert an upright RGBA frame into a YuNet-ready tensor.
pub fn preprocess_for_detector(
    image: &RgbaImage,
    config: &PreprocessConfig,
) -> Result<PreprocessOutput, InferenceError> {
    let _guard = timing_guard("facestyle_core::preprocess_for_detector", log::Level::Trace);
    let InputSize {
        width: input_w,
        height: input_h,
    } = config.input_size;
    let (orig_w, orig_h) = image.dimensions();
    let (scale_x, scale_y) = compute_resize_scales((orig_w, orig_h), (input_w, input_h))
        .map_err(|e| InferenceError::Preprocess(e.to_string()))?;

    let rgb: RgbImage = if (orig_w, orig_h) == (input_w, input_h) {
        DynamicImage::ImageRgba8(image.clone()).to_rgb8()
    } else {
        resize_to_rgb(image, input_w, input_h, config.resize_filter())
    };
    let chw = rgb_to_bgr_chw(&rgb);

    let shape = [1usize, 3, input_h as usize, input_w as usize];
    let (data, offset) = chw.into_raw_vec_and_offset();
    debug_assert_eq!(offset, Some(0), "expected contiguous array");
    let tensor = Tensor::from_shape(&shape, &data)
        .map_err(|e| InferenceError::Preprocess(format!("failed to build tensor: {e}")))?;

    Ok(PreprocessOutput {
        tensor,
        scale_x,
        scale_y,
        original_size: (orig_w, orig_h),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn preprocess_generates_bgr_tensor() {
        let mut img = RgbaImage::new(4, 4);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let value = ((x + y) * 32) as u8;
            *pixel = Rgba([value, value / 2, 255, 255]);
        }

        let config = PreprocessConfig {
            input_size: InputSize::new(2, 2),
            resize_quality: ResizeQuality::Speed,
        };
        let output = preprocess_for_detector(&img, &config).expect("preprocess should succeed");

        assert_eq!(output.original_size, (4, 4));
        assert_eq!((output.scale_x, output.scale_y), (2.0, 2.0));
        assert_eq!(output.tensor.shape(), &[1, 3, 2, 2]);

        let data = output.tensor.as_slice::<f32>().unwrap();
        assert!(data.iter().all(|v| (0.0..=255.0).contains(v)));
        // Blue plane first: the source blue channel is saturated everywhere.
        assert!(data[..4].iter().all(|v| *v == 255.0));
    }

    #[test]
    fn same_size_input_skips_resampling() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 0]));
        let config = PreprocessConfig {
            input_size: InputSize::new(3, 2),
            resize_quality: ResizeQuality::Quality,
        };
        let output = preprocess_for_detector(&img, &config).expect("preprocess");
        let data = output.tensor.as_slice::<f32>().unwrap();
        assert_eq!(&data[..6], &[3.0; 6]);
        assert_eq!(&data[12..], &[1.0; 6]);
    }

    #[test]
    fn zero_sized_frames_are_rejected() {
        let img = RgbaImage::new(0, 0);
        assert!(matches!(
            preprocess_for_detector(&img, &PreprocessConfig::default()),
            Err(InferenceError::Preprocess(_))
        ));
    }

    #[test]
    fn converts_dimensions_into_config() {
        let dims = InputDimensions {
            width: 320,
            height: 240,
            resize_quality: ResizeQuality::Quality,
        };
        let config: PreprocessConfig = (&dims).into();
        assert_eq!(config.input_size, InputSize::new(320, 240));
        assert_eq!(config.resize_quality, ResizeQuality::Quality);
    }
}
