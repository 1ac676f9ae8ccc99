//! Conversions between RGBA images and stylizer tensors.

use facestyle_utils::{config::TensorNormalization, rgba_to_rgb_chw, rgba_to_rgb_hwc};
use image::RgbaImage;
use tract_onnx::prelude::Tensor;

use crate::error::InferenceError;
use crate::model::{TensorLayout, TensorSpec, check_shape};

/// Build the stylizer input tensor. The image must already match the tensor resolution.
pub fn image_to_tensor(
    image: &RgbaImage,
    spec: TensorSpec,
    normalization: TensorNormalization,
) -> Result<Tensor, InferenceError> {
    if image.dimensions() != (spec.width, spec.height) {
        return Err(InferenceError::Preprocess(format!(
            "image is {}x{}, model expects {}x{}",
            image.width(),
            image.height(),
            spec.width,
            spec.height
        )));
    }

    let array = match spec.layout {
        TensorLayout::Nchw => rgba_to_rgb_chw(image, normalization),
        TensorLayout::Nhwc => rgba_to_rgb_hwc(image, normalization),
    };
    let (data, offset) = array.into_raw_vec_and_offset();
    debug_assert_eq!(offset, Some(0), "expected contiguous array");
    Tensor::from_shape(&spec.shape(), &data)
        .map_err(|e| InferenceError::Preprocess(format!("failed to build tensor: {e}")))
}

/// Write a stylizer output tensor into `out` as tightly packed RGBA8.
///
/// `out` is cleared first and ends up exactly `width * height * 4` bytes long; alpha is opaque.
pub fn tensor_to_rgba(
    tensor: &Tensor,
    spec: TensorSpec,
    normalization: TensorNormalization,
    out: &mut Vec<u8>,
) -> Result<(), InferenceError> {
    check_shape(tensor, &spec)?;
    let data = tensor
        .as_slice::<f32>()
        .map_err(|e| InferenceError::Decode(format!("stylizer output is not f32: {e}")))?;

    let (w, h) = (spec.width as usize, spec.height as usize);
    let plane = w * h;
    out.clear();
    out.reserve(plane * 4);

    match spec.layout {
        TensorLayout::Nchw => {
            let (r, rest) = data.split_at(plane);
            let (g, b) = rest.split_at(plane);
            for i in 0..plane {
                out.extend_from_slice(&[
                    normalization.denormalize(r[i]),
                    normalization.denormalize(g[i]),
                    normalization.denormalize(b[i]),
                    255,
                ]);
            }
        }
        TensorLayout::Nhwc => {
            for rgb in data.chunks_exact(3) {
                out.extend_from_slice(&[
                    normalization.denormalize(rgb[0]),
                    normalization.denormalize(rgb[1]),
                    normalization.denormalize(rgb[2]),
                    255,
                ]);
            }
        }
    }
    debug_assert_eq!(out.len(), plane * 4);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn builds_planar_and_interleaved_tensors() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 0, Rgba([0, 255, 0, 7]));

        let nchw = image_to_tensor(
            &image,
            TensorSpec::new(TensorLayout::Nchw, 2, 1),
            TensorNormalization::ZeroToOne,
        )
        .expect("nchw");
        assert_eq!(nchw.shape(), &[1, 3, 1, 2]);
        assert_eq!(
            nchw.as_slice::<f32>().unwrap(),
            &[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
        );

        let nhwc = image_to_tensor(
            &image,
            TensorSpec::new(TensorLayout::Nhwc, 2, 1),
            TensorNormalization::MinusOneToOne,
        )
        .expect("nhwc");
        assert_eq!(nhwc.shape(), &[1, 1, 2, 3]);
        assert_eq!(
            nhwc.as_slice::<f32>().unwrap(),
            &[1.0, -1.0, -1.0, -1.0, 1.0, -1.0]
        );
    }

    #[test]
    fn rejects_images_at_the_wrong_resolution() {
        let image = RgbaImage::new(3, 3);
        let err = image_to_tensor(
            &image,
            TensorSpec::new(TensorLayout::Nchw, 4, 4),
            TensorNormalization::default(),
        )
        .expect_err("size mismatch");
        assert!(matches!(err, InferenceError::Preprocess(_)));
    }

    #[test]
    fn writes_opaque_rgba_from_planar_output() {
        let spec = TensorSpec::new(TensorLayout::Nchw, 2, 1);
        // r = [1, -1], g = [0, 1], b = [-1, 5]
        let tensor =
            Tensor::from_shape(&[1, 3, 1, 2], &[1.0f32, -1.0, 0.0, 1.0, -1.0, 5.0]).unwrap();
        let mut out = vec![9u8; 3];
        tensor_to_rgba(&tensor, spec, TensorNormalization::MinusOneToOne, &mut out)
            .expect("convert");
        assert_eq!(out, vec![255, 128, 0, 255, 0, 255, 255, 255]);
    }

    #[test]
    fn writes_rgba_from_interleaved_output() {
        let spec = TensorSpec::new(TensorLayout::Nhwc, 1, 2);
        let tensor =
            Tensor::from_shape(&[1, 2, 1, 3], &[0.0f32, 0.5, 1.0, f32::NAN, 2.0, -3.0]).unwrap();
        let mut out = Vec::new();
        tensor_to_rgba(&tensor, spec, TensorNormalization::ZeroToOne, &mut out).expect("convert");
        assert_eq!(out, vec![0, 128, 255, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn mismatched_output_shape_is_reported() {
        let spec = TensorSpec::new(TensorLayout::Nchw, 2, 2);
        let tensor = Tensor::from_shape(&[1, 3, 1, 2], &[0.0f32; 6]).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            tensor_to_rgba(&tensor, spec, TensorNormalization::ZeroToOne, &mut out),
            Err(InferenceError::ShapeMismatch { .. })
        ));
    }
}
