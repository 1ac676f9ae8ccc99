//! Per-image JSON report.

use std::{
    fs::{self, File},
    path::Path,
};

use anyhow::{Context, Result};
use facestyle_core::FaceRegion;
use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FaceRecord {
    pub score: f32,
    pub bbox: [f32; 4],
    pub roll_degrees: f32,
}

impl From<&FaceRegion> for FaceRecord {
    fn from(region: &FaceRegion) -> Self {
        Self {
            score: region.score,
            bbox: [
                region.bbox.x,
                region.bbox.y,
                region.bbox.width,
                region.bbox.height,
            ],
            roll_degrees: region.roll().to_degrees(),
        }
    }
}

/// Outcome for one input image.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageReport {
    pub image: String,
    pub face_found: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face: Option<FaceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated: Option<String>,
}

impl ImageReport {
    pub fn failed(image: &Path, error: &anyhow::Error) -> Self {
        Self {
            image: image.display().to_string(),
            face_found: false,
            output: None,
            error: Some(format!("{error:#}")),
            face: None,
            annotated: None,
        }
    }
}

/// Write `reports` as pretty JSON to `json_path`, or to stdout when no path is given.
pub fn write_reports(reports: &[ImageReport], json_path: Option<&Path>) -> Result<()> {
    let Some(json_path) = json_path else {
        let json = serde_json::to_string_pretty(reports).context("failed to serialize report")?;
        println!("{json}");
        return Ok(());
    };

    if let Some(dir) = json_path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let file = File::create(json_path)
        .with_context(|| format!("failed to create {}", json_path.display()))?;
    serde_json::to_writer_pretty(file, reports)
        .with_context(|| format!("failed to write report JSON to {}", json_path.display()))?;
    info!("Wrote report to {}", json_path.display());
    Ok(())
}
