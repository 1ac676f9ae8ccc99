//! Command-line argument definitions for facestyle-cli.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use facestyle_utils::{
    ImageFormatHint,
    config::{ResizeQuality, TensorNormalization},
};

/// Stylize the most prominent face in images or directories of images.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct StylizeArgs {
    /// Path to an image file or a directory containing images.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to the stylizer ONNX model (defaults to the settings file, then built-in path).
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Path to the YuNet face detector ONNX model.
    #[arg(long)]
    pub detector_model: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/facestyle.json` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for stylized faces (defaults to `stylized` next to the working directory).
    #[arg(short, long, default_value = "stylized")]
    pub output_dir: PathBuf,

    /// Hand results to the writer as views over the pipeline buffer instead of copies.
    #[arg(long, action = ArgAction::SetTrue)]
    pub zero_copy: bool,

    /// Write the per-image report to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Directory to write input images with the stylized face region outlined.
    #[arg(long)]
    pub annotate: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Clockwise rotation (0, 90, 180, 270) that makes every input upright.
    #[arg(long, default_value_t = 0, value_parser = parse_rotation)]
    pub rotation: i32,

    /// Square crop side relative to the larger face box side.
    #[arg(long)]
    pub roi_scale: Option<f32>,

    /// Crop axis-aligned instead of leveling the eyes.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_align: bool,

    /// Stylizer tensor range: `zero_to_one` or `minus_one_to_one`.
    #[arg(long, value_name = "RANGE")]
    pub normalization: Option<TensorNormalization>,

    /// Detector resize mode: `quality` (Triangle) or `speed` (fast Nearest).
    #[arg(long, value_name = "MODE")]
    pub resize_quality: Option<ResizeQuality>,

    /// Override score threshold.
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Override NMS threshold.
    #[arg(long)]
    pub nms_threshold: Option<f32>,

    /// Output format for stylized faces: `png` or `jpeg`.
    #[arg(long, value_name = "FORMAT")]
    pub output_format: Option<ImageFormatHint>,

    /// JPEG quality (1-100) when writing JPEG output.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: Option<u8>,
}

fn parse_rotation(value: &str) -> Result<i32, String> {
    let degrees: i32 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    match degrees {
        0 | 90 | 180 | 270 => Ok(degrees),
        other => Err(format!("rotation must be 0, 90, 180 or 270 (got {other})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_invocation() {
        let args = StylizeArgs::try_parse_from(["facestyle-cli", "--input", "photos"])
            .expect("parse");
        assert_eq!(args.input, PathBuf::from("photos"));
        assert_eq!(args.output_dir, PathBuf::from("stylized"));
        assert_eq!(args.rotation, 0);
        assert!(!args.zero_copy);
        assert!(args.model.is_none());
    }

    #[test]
    fn parses_overrides() {
        let args = StylizeArgs::try_parse_from([
            "facestyle-cli",
            "-i",
            "a.jpg",
            "--model",
            "style.onnx",
            "--zero-copy",
            "--rotation",
            "270",
            "--roi-scale",
            "2.0",
            "--normalization",
            "zero_to_one",
            "--jpeg-quality",
            "75",
        ])
        .expect("parse");
        assert!(args.zero_copy);
        assert_eq!(args.rotation, 270);
        assert_eq!(args.roi_scale, Some(2.0));
        assert_eq!(args.normalization, Some(TensorNormalization::ZeroToOne));
        assert_eq!(args.jpeg_quality, Some(75));
    }

    #[test]
    fn rejects_odd_rotations_and_missing_input() {
        assert!(StylizeArgs::try_parse_from(["facestyle-cli", "-i", "a", "--rotation", "45"]).is_err());
        assert!(StylizeArgs::try_parse_from(["facestyle-cli"]).is_err());
        assert!(
            StylizeArgs::try_parse_from(["facestyle-cli", "-i", "a", "--jpeg-quality", "0"])
                .is_err()
        );
        assert!(
            StylizeArgs::try_parse_from(["facestyle-cli", "-i", "a", "--output-format", "gif"])
                .is_err()
        );
    }
}
