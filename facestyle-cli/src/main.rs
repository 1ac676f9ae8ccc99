mod annotate;
mod args;
mod input;
mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use facestyle_core::{FaceStylizer, ImageFrame, PixelFormat, Rotation, StylizerOptions};
use facestyle_utils::{
    OutputOptions, configure_telemetry,
    config::{ExecutionMode, StylizerSettings, default_settings_path},
    derive_output_path, init_logging, load_image, normalize_path, save_rgba_bytes,
};
use log::{debug, info, warn};

use crate::annotate::annotate_image;
use crate::args::StylizeArgs;
use crate::input::collect_images;
use crate::report::{FaceRecord, ImageReport, write_reports};

const OUTPUT_SUFFIX: &str = "_stylized";

struct RunContext {
    output_dir: PathBuf,
    annotate_dir: Option<PathBuf>,
    output_options: OutputOptions,
    rotation: Rotation,
}

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = StylizeArgs::parse();

    let input_path = normalize_path(&args.input)?;
    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args);

    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );
    let output_options = OutputOptions::try_from(&settings.output)?;

    let options = StylizerOptions::from(&settings);
    info!(
        "Loading stylizer {} with detector {} ({} mode)",
        options.model_path.display(),
        options.detector_model_path.display(),
        options.execution_mode
    );
    let model_path = options.model_path.clone();
    let mut stylizer = FaceStylizer::from_options(options)
        .with_context(|| format!("failed to load stylizer from {}", model_path.display()))?;
    let (out_w, out_h) = stylizer.output_size();
    debug!("Stylized faces will be {out_w}x{out_h}");

    let images = collect_images(&input_path)?;
    if images.is_empty() {
        anyhow::bail!(
            "no images found at {} (supported extensions: jpg, jpeg, png, bmp)",
            input_path.display()
        );
    }

    let ctx = RunContext {
        output_dir: args.output_dir.clone(),
        annotate_dir: args.annotate.clone(),
        output_options,
        rotation: Rotation::from_degrees(args.rotation).unwrap_or_default(),
    };

    info!("Processing {} image(s)...", images.len());
    let mut reports = Vec::with_capacity(images.len());
    for image_path in &images {
        let report = match process_image(&mut stylizer, image_path, &ctx) {
            Ok(report) => report,
            Err(err) => {
                warn!("Failed to process {}: {err:#}", image_path.display());
                ImageReport::failed(image_path, &err)
            }
        };
        reports.push(report);
    }

    write_reports(&reports, args.json.as_deref())?;

    if reports.iter().all(|r| r.error.is_some()) {
        anyhow::bail!("all {} image(s) failed to stylize", reports.len());
    }
    let found = reports.iter().filter(|r| r.face_found).count();
    info!("Stylized {found} of {} image(s)", reports.len());
    Ok(())
}

fn process_image(
    stylizer: &mut FaceStylizer,
    image_path: &Path,
    ctx: &RunContext,
) -> Result<ImageReport> {
    let rgba = load_image(image_path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let frame = ImageFrame::new(rgba.as_raw().as_slice(), width, height, PixelFormat::Rgba32)
        .with_rotation(ctx.rotation);

    let output_path = derive_output_path(
        image_path,
        &ctx.output_dir,
        OUTPUT_SUFFIX,
        ctx.output_options.format.extension(),
    );
    let written = stylizer.stylize_with(&frame, |result| -> Result<bool> {
        let result = result?;
        let Some(image) = result.stylized_image.as_ref() else {
            return Ok(false);
        };
        debug!(
            "{}: writing {} stylized face",
            image_path.display(),
            if result.is_zero_copy() { "borrowed" } else { "owned" }
        );
        save_rgba_bytes(
            &output_path,
            image.as_bytes(),
            image.width(),
            image.height(),
            &ctx.output_options,
        )?;
        Ok(true)
    })?;

    for (stage, elapsed) in stylizer.last_timings().entries() {
        debug!("{}: {stage} took {elapsed:.2?}", image_path.display());
    }

    if !written {
        info!("{} -> no face found", image_path.display());
        return Ok(ImageReport {
            image: image_path.display().to_string(),
            face_found: false,
            output: None,
            error: None,
            face: None,
            annotated: None,
        });
    }
    info!("{} -> {}", image_path.display(), output_path.display());

    let region = stylizer.last_region().cloned();
    let annotated = match (ctx.annotate_dir.as_ref(), region.as_ref()) {
        (Some(dir), Some(region)) => {
            let upright = frame.normalize()?;
            match annotate_image(&upright, region, image_path, dir) {
                Ok(path) => Some(path.display().to_string()),
                Err(err) => {
                    warn!("Failed to annotate {}: {err:#}", image_path.display());
                    None
                }
            }
        }
        _ => None,
    };

    Ok(ImageReport {
        image: image_path.display().to_string(),
        face_found: true,
        output: Some(output_path.display().to_string()),
        error: None,
        face: region.as_ref().map(FaceRecord::from),
        annotated,
    })
}

fn load_settings(config_path: Option<&PathBuf>) -> Result<StylizerSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        return StylizerSettings::load_from_path(&resolved);
    }
    let default_path = default_settings_path();
    if default_path.is_file() {
        debug!("Using settings from {}", default_path.display());
        StylizerSettings::load_from_path(&default_path)
    } else {
        Ok(StylizerSettings::default())
    }
}

fn apply_cli_overrides(settings: &mut StylizerSettings, args: &StylizeArgs) {
    if let Some(model) = args.model.as_ref() {
        settings.model_path = Some(model.display().to_string());
    }
    if let Some(detector) = args.detector_model.as_ref() {
        settings.detector_model_path = Some(detector.display().to_string());
    }
    if args.zero_copy {
        settings.execution_mode = ExecutionMode::ZeroCopy;
    }
    if let Some(roi_scale) = args.roi_scale {
        settings.alignment.roi_scale = roi_scale;
    }
    if args.no_align {
        settings.alignment.align_roll = false;
    }
    if let Some(normalization) = args.normalization {
        settings.alignment.normalization = normalization;
    }
    if let Some(quality) = args.resize_quality {
        settings.input.resize_quality = quality;
    }
    if let Some(score) = args.score_threshold {
        settings.detection.score_threshold = score;
    }
    if let Some(nms) = args.nms_threshold {
        settings.detection.nms_threshold = nms;
    }
    if let Some(format) = args.output_format {
        settings.output.format = format.to_string();
    }
    if let Some(quality) = args.jpeg_quality {
        settings.output.jpeg_quality = quality;
    }
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        settings.telemetry.level = level.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facestyle_utils::config::TensorNormalization;

    #[test]
    fn cli_overrides_replace_settings() {
        let args = StylizeArgs::try_parse_from([
            "facestyle-cli",
            "-i",
            "in",
            "-m",
            "style.onnx",
            "--detector-model",
            "yunet.onnx",
            "--zero-copy",
            "--no-align",
            "--roi-scale",
            "2.5",
            "--normalization",
            "zero-to-one",
            "--score-threshold",
            "0.5",
            "--output-format",
            "jpeg",
            "--telemetry",
        ])
        .expect("parse");

        let mut settings = StylizerSettings::default();
        apply_cli_overrides(&mut settings, &args);
        assert_eq!(settings.model_path(), PathBuf::from("style.onnx"));
        assert_eq!(settings.detector_model_path(), PathBuf::from("yunet.onnx"));
        assert_eq!(settings.execution_mode, ExecutionMode::ZeroCopy);
        assert!(!settings.alignment.align_roll);
        assert_eq!(settings.alignment.roi_scale, 2.5);
        assert_eq!(
            settings.alignment.normalization,
            TensorNormalization::ZeroToOne
        );
        assert_eq!(settings.detection.score_threshold, 0.5);
        assert_eq!(settings.output.format, "jpeg");
        assert!(settings.telemetry.enabled);
    }

    #[test]
    fn configured_output_format_must_be_known() {
        let args = StylizeArgs::try_parse_from(["facestyle-cli", "-i", "in"]).expect("parse");
        let mut settings = StylizerSettings::default();
        settings.output.format = "webp".into();
        apply_cli_overrides(&mut settings, &args);
        assert!(OutputOptions::try_from(&settings.output).is_err());

        let args = StylizeArgs::try_parse_from([
            "facestyle-cli",
            "-i",
            "in",
            "--output-format",
            "jpg",
        ])
        .expect("parse");
        apply_cli_overrides(&mut settings, &args);
        let options = OutputOptions::try_from(&settings.output).expect("cli format wins");
        assert_eq!(options.format, facestyle_utils::ImageFormatHint::Jpeg);
    }

    #[test]
    fn defaults_survive_without_overrides() {
        let args = StylizeArgs::try_parse_from(["facestyle-cli", "-i", "in"]).expect("parse");
        let mut settings = StylizerSettings::default();
        apply_cli_overrides(&mut settings, &args);
        assert_eq!(settings.execution_mode, ExecutionMode::Copy);
        assert!(settings.alignment.align_roll);
        assert!(!settings.telemetry.enabled);
    }
}
