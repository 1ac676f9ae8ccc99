//! Common helpers shared across facestyle crates.

/// Stylizer settings and their JSON persistence.
pub mod config;
/// Image loading, resizing, and tensor layout conversion.
pub mod image_utils;
/// Image output helpers (encoding, output naming).
pub mod output;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use config::{
    AlignmentSettings, DetectionSettings, ExecutionMode, InputDimensions, OutputSettings,
    ResizeQuality, StylizerSettings, TelemetrySettings, TensorNormalization,
};
pub use image_utils::{
    compute_resize_scales, load_image, resize_to_rgb, rgb_to_bgr_chw, rgba_to_rgb_chw,
    rgba_to_rgb_hwc,
};
pub use output::{
    ImageFormatHint, OutputOptions, derive_output_path, save_rgba_bytes, save_rgba_image,
};
pub use telemetry::{
    StageTimings, TimingGuard, configure as configure_telemetry, telemetry_allows,
    telemetry_enabled, telemetry_level, timing_guard,
};

/// Initialize logging once for CLI environments.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Telemetry records are always
/// let through at trace so [`configure_telemetry`] alone decides whether they appear.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(telemetry::TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn normalize_path_rejects_missing() {
        let dir = tempdir().expect("tempdir");
        assert!(normalize_path(dir.path().join("absent.png")).is_err());
        let resolved = normalize_path(dir.path()).expect("existing dir");
        assert!(resolved.is_absolute());
    }
}
