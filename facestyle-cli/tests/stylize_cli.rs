use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use image::{ImageBuffer, Rgb};
use serde::Deserialize;
use tempfile::tempdir;

const STYLIZER_REL_PATH: &str = "../models/face_stylizer.onnx";
const DETECTOR_REL_PATH: &str = "../models/face_detection_yunet_2023mar_640.onnx";

#[derive(Debug, Deserialize)]
struct CliReport {
    image: String,
    face_found: bool,
    output: Option<String>,
    error: Option<String>,
}

fn write_sample_image(path: &Path) -> Result<(), Box<dyn Error>> {
    let img = ImageBuffer::from_fn(32, 32, |x, y| {
        let r = ((x + y) % 255) as u8;
        Rgb([r, 128, 255u8.saturating_sub(r)])
    });
    img.save(path)?;
    Ok(())
}

fn existing_models() -> Option<(PathBuf, PathBuf)> {
    let stylizer = PathBuf::from(STYLIZER_REL_PATH);
    let detector = PathBuf::from(DETECTOR_REL_PATH);
    if stylizer.exists() && detector.exists() {
        Some((stylizer, detector))
    } else {
        eprintln!("skipping model-backed CLI test; models missing under ../models");
        None
    }
}

#[test]
fn help_lists_stylize_options() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("facestyle-cli").arg("--help").output()?;
    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for flag in ["--input", "--model", "--zero-copy", "--rotation", "--json"] {
        assert!(help.contains(flag), "help text should mention {flag}");
    }
    Ok(())
}

#[test]
fn missing_model_fails_before_processing() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let image_path = work_dir.path().join("sample.png");
    write_sample_image(&image_path)?;
    let output_dir = work_dir.path().join("out");

    let output = cargo_bin_cmd!("facestyle-cli")
        .arg("--input")
        .arg(&image_path)
        .arg("--model")
        .arg(work_dir.path().join("absent.onnx"))
        .arg("--output-dir")
        .arg(&output_dir)
        .output()?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load stylizer"),
        "unexpected stderr: {stderr}"
    );
    assert!(!output_dir.exists(), "nothing should be written on load failure");
    Ok(())
}

#[test]
fn corrupt_model_is_rejected() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let image_path = work_dir.path().join("sample.png");
    write_sample_image(&image_path)?;
    let model_path = work_dir.path().join("corrupt.onnx");
    fs::write(&model_path, b"not a real onnx file")?;

    cargo_bin_cmd!("facestyle-cli")
        .arg("--input")
        .arg(&image_path)
        .arg("--model")
        .arg(&model_path)
        .assert()
        .failure();
    Ok(())
}

#[test]
fn missing_input_is_an_error() {
    cargo_bin_cmd!("facestyle-cli")
        .arg("--input")
        .arg("definitely/not/here.png")
        .assert()
        .failure();
}

#[test]
fn out_of_range_rotation_is_rejected_by_parser() {
    cargo_bin_cmd!("facestyle-cli")
        .args(["--input", "a.png", "--rotation", "45"])
        .assert()
        .failure();
}

#[test]
fn stylizes_directory_and_reports_json() -> Result<(), Box<dyn Error>> {
    let Some((stylizer, detector)) = existing_models() else {
        return Ok(());
    };

    let work_dir = tempdir()?;
    let input_dir = work_dir.path().join("in");
    fs::create_dir_all(&input_dir)?;
    write_sample_image(&input_dir.join("a.png"))?;
    write_sample_image(&input_dir.join("b.png"))?;
    let output_dir = work_dir.path().join("out");
    let json_path = work_dir.path().join("report.json");

    cargo_bin_cmd!("facestyle-cli")
        .arg("--input")
        .arg(&input_dir)
        .arg("--model")
        .arg(&stylizer)
        .arg("--detector-model")
        .arg(&detector)
        .arg("--output-dir")
        .arg(&output_dir)
        .arg("--zero-copy")
        .arg("--json")
        .arg(&json_path)
        .assert()
        .success();

    let reports: Vec<CliReport> = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert!(report.error.is_none(), "{}: {:?}", report.image, report.error);
        assert_eq!(report.face_found, report.output.is_some());
        if let Some(output) = report.output.as_ref() {
            assert!(Path::new(output).exists());
        }
    }
    Ok(())
}
