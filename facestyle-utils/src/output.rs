//! Encoding helpers for writing stylized images to disk.

use crate::config::OutputSettings;

use anyhow::{Context, Result};
use image::{
    ExtendedColorType, ImageEncoder, RgbaImage,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};
use log::debug;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

/// Image formats supported by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormatHint {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormatHint {
    /// Determine format from a filesystem extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }

    /// Canonical file extension for the format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

impl std::fmt::Display for ImageFormatHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        })
    }
}

impl std::str::FromStr for ImageFormatHint {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(format!("unknown image format '{other}'")),
        }
    }
}

/// Immutable encoding configuration derived from [`OutputSettings`].
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: ImageFormatHint,
    pub auto_detect: bool,
    pub jpeg_quality: u8,
}

impl Default for OutputOptions {
    fn default() -> Self {
        let settings = OutputSettings::default();
        Self {
            format: ImageFormatHint::default(),
            auto_detect: settings.auto_detect_format,
            jpeg_quality: settings.jpeg_quality,
        }
    }
}

impl TryFrom<&OutputSettings> for OutputOptions {
    type Error = anyhow::Error;

    fn try_from(settings: &OutputSettings) -> Result<Self> {
        let format = settings
            .format
            .parse()
            .map_err(|e: String| anyhow::anyhow!("output format: {e} (expected png or jpeg)"))?;
        Ok(Self {
            format,
            auto_detect: settings.auto_detect_format,
            jpeg_quality: settings.jpeg_quality.clamp(1, 100),
        })
    }
}

impl OutputOptions {
    /// Format used for `path`, honouring extension detection when enabled.
    pub fn resolve_format(&self, path: &Path) -> ImageFormatHint {
        if self.auto_detect
            && let Some(hint) = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(ImageFormatHint::from_extension)
        {
            return hint;
        }
        self.format
    }
}

/// Append `suffix` to the file stem of `path`, keeping its directory, and set the extension.
pub fn derive_output_path(source: &Path, out_dir: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    out_dir.join(format!("{stem}{suffix}.{ext}"))
}

/// Encode an RGBA image to `path`, creating parent directories as needed.
pub fn save_rgba_image(path: &Path, image: &RgbaImage, options: &OutputOptions) -> Result<()> {
    let (width, height) = image.dimensions();
    save_rgba_bytes(path, image.as_raw(), width, height, options)
}

/// Encode tightly packed RGBA8 pixels to `path`.
///
/// JPEG has no alpha channel, so pixels are flattened to RGB first.
pub fn save_rgba_bytes(
    path: &Path,
    pixels: &[u8],
    width: u32,
    height: u32,
    options: &OutputOptions,
) -> Result<()> {
    let expected = width as usize * height as usize * 4;
    anyhow::ensure!(
        pixels.len() == expected,
        "expected {expected} RGBA bytes for {width}x{height}, got {}",
        pixels.len()
    );

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }

    let format = options.resolve_format(path);
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);

    match format {
        ImageFormatHint::Png => PngEncoder::new(writer)
            .write_image(pixels, width, height, ExtendedColorType::Rgba8)
            .with_context(|| format!("failed to encode PNG {}", path.display()))?,
        ImageFormatHint::Jpeg => {
            let rgb: Vec<u8> = pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            JpegEncoder::new_with_quality(writer, options.jpeg_quality)
                .write_image(&rgb, width, height, ExtendedColorType::Rgb8)
                .with_context(|| format!("failed to encode JPEG {}", path.display()))?
        }
    }

    debug!("wrote {:?} image to {}", format, path.display());
    Ok(())
}
