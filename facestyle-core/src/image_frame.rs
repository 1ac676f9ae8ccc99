//! Frame representation shared by inputs and results.
//!
//! An [`ImageFrame`] either owns its pixels or borrows them from somewhere else. Inputs
//! usually borrow a platform buffer; results own a heap copy or borrow the stylizer's
//! scratch memory (see [`crate::StylizationResult`]).

use std::borrow::Cow;

use image::{RgbaImage, imageops};

use crate::error::StylizerError;

/// Pixel layout of a frame buffer.
///
/// Only the two 32-bit layouts can be stylized; the rest exist so foreign buffers can be
/// described and rejected with [`StylizerError::UnsupportedFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba32,
    Bgra32,
    Rgb24,
    Gray8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba32 | PixelFormat::Bgra32 => 4,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    pub const fn is_supported(self) -> bool {
        matches!(self, PixelFormat::Rgba32 | PixelFormat::Bgra32)
    }
}

/// Clockwise rotation that turns the stored frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse a rotation in degrees. Only right angles are accepted.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub const fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Dimensions after applying the rotation to a `width` x `height` frame.
    pub const fn rotated_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Rotation::Deg0 | Rotation::Deg180 => (width, height),
            Rotation::Deg90 | Rotation::Deg270 => (height, width),
        }
    }
}

/// A tightly packed pixel buffer with its geometry and orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame<'a> {
    data: Cow<'a, [u8]>,
    width: u32,
    height: u32,
    format: PixelFormat,
    rotation: Rotation,
}

impl<'a> ImageFrame<'a> {
    /// Wrap a pixel buffer. Geometry is validated lazily by [`normalize`](Self::normalize).
    pub fn new(
        data: impl Into<Cow<'a, [u8]>>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            format,
            rotation: Rotation::Deg0,
        }
    }

    /// Attach the rotation needed to make the frame upright.
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// `true` when the pixels live outside this frame.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.data, Cow::Borrowed(_))
    }

    /// Detach from any borrowed storage by copying the pixels.
    pub fn into_owned(self) -> ImageFrame<'static> {
        ImageFrame {
            data: Cow::Owned(self.data.into_owned()),
            width: self.width,
            height: self.height,
            format: self.format,
            rotation: self.rotation,
        }
    }

    /// Validate the buffer and produce upright RGBA pixels.
    ///
    /// The format check runs first so an unsupported buffer never yields partial output.
    pub fn normalize(&self) -> Result<RgbaImage, StylizerError> {
        if !self.format.is_supported() {
            return Err(StylizerError::UnsupportedFormat(self.format));
        }
        if self.width == 0 || self.height == 0 {
            return Err(StylizerError::InvalidBuffer(format!(
                "frame dimensions must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        if self.data.len() != expected {
            return Err(StylizerError::InvalidBuffer(format!(
                "expected {expected} bytes for {}x{} {:?}, got {}",
                self.width,
                self.height,
                self.format,
                self.data.len()
            )));
        }

        let mut pixels = self.data.to_vec();
        if self.format == PixelFormat::Bgra32 {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        let upright = RgbaImage::from_raw(self.width, self.height, pixels).ok_or_else(|| {
            StylizerError::InvalidBuffer("pixel buffer does not match dimensions".into())
        })?;

        Ok(match self.rotation {
            Rotation::Deg0 => upright,
            Rotation::Deg90 => imageops::rotate90(&upright),
            Rotation::Deg180 => imageops::rotate180(&upright),
            Rotation::Deg270 => imageops::rotate270(&upright),
        })
    }
}

impl ImageFrame<'static> {
    /// Take ownership of an RGBA image without copying.
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, PixelFormat::Rgba32)
    }
}
