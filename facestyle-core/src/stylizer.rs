//! The face stylization pipeline.

use std::path::Path;
use std::time::Instant;

use facestyle_utils::{StageTimings, config::ExecutionMode, timing_guard};
use log::{Level, debug, trace};

use crate::align::align_face;
use crate::detector::YuNetLocator;
use crate::error::StylizerError;
use crate::image_frame::{ImageFrame, PixelFormat};
use crate::locator::{FaceRegion, FaceRegionLocator};
use crate::model::{ModelRunner, StylizerModel};
use crate::options::StylizerOptions;
use crate::tensor::{image_to_tensor, tensor_to_rgba};

/// Progress of a single stylize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    Idle,
    RegionLocated,
    Preprocessed,
    Inferred,
    PostProcessed,
    Done,
}

/// Outcome of a successful stylize call.
///
/// `stylized_image` is `None` when the frame holds no face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylizationResult<'a> {
    pub stylized_image: Option<ImageFrame<'a>>,
}

impl<'a> StylizationResult<'a> {
    pub fn empty() -> Self {
        Self {
            stylized_image: None,
        }
    }

    pub fn face_found(&self) -> bool {
        self.stylized_image.is_some()
    }

    /// `true` when the image is a view over pipeline storage rather than an owned copy.
    pub fn is_zero_copy(&self) -> bool {
        self.stylized_image
            .as_ref()
            .is_some_and(ImageFrame::is_borrowed)
    }

    /// Copy any borrowed pixels so the result outlives the call that produced it.
    pub fn into_owned(self) -> StylizationResult<'static> {
        StylizationResult {
            stylized_image: self.stylized_image.map(ImageFrame::into_owned),
        }
    }
}

/// Locates the most prominent face in a frame and runs it through a stylization model.
///
/// Each instance owns its model, its locator and a reusable output buffer. Methods take
/// `&mut self`, so one instance serves one call at a time; share across threads behind your
/// own lock or give each thread its own instance.
///
/// ```no_run
/// use facestyle_core::{FaceStylizer, ImageFrame, PixelFormat};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut stylizer = FaceStylizer::from_model_path("models/face_stylizer.onnx")?;
/// let pixels = vec![0u8; 640 * 480 * 4];
/// let frame = ImageFrame::new(pixels.as_slice(), 640, 480, PixelFormat::Rgba32);
///
/// let result = stylizer.stylize(&frame)?;
/// if let Some(image) = result.stylized_image {
///     println!("stylized {}x{}", image.width(), image.height());
/// }
/// # Ok(())
/// # }
/// ```
///
/// A zero-copy view handed to [`stylize_with`](Self::stylize_with) cannot leave the handler:
///
/// ```compile_fail
/// use facestyle_core::{FaceStylizer, ImageFrame, StylizationResult};
///
/// fn keep_view(stylizer: &mut FaceStylizer, frame: &ImageFrame<'_>) {
///     let mut escaped: Option<StylizationResult<'_>> = None;
///     stylizer.stylize_with(frame, |result| {
///         escaped = result.ok();
///     });
///     drop(escaped);
/// }
/// ```
pub struct FaceStylizer<M = StylizerModel, L = YuNetLocator> {
    model: M,
    locator: L,
    options: StylizerOptions,
    scratch: Vec<u8>,
    stage: Stage,
    timings: StageTimings,
    last_region: Option<FaceRegion>,
}

impl FaceStylizer<StylizerModel, YuNetLocator> {
    /// Load a stylizer model with default detector and alignment settings.
    pub fn from_model_path<P: AsRef<Path>>(model_path: P) -> Result<Self, StylizerError> {
        Self::from_options(StylizerOptions::with_model_path(model_path.as_ref()))
    }

    /// Load both models described by `options`.
    pub fn from_options(options: StylizerOptions) -> Result<Self, StylizerError> {
        options.validate()?;
        let model = StylizerModel::load(&options.model_path)?;
        let locator = YuNetLocator::load(
            &options.detector_model_path,
            options.detector.clone(),
            options.detection.clone(),
        )?;
        Self::with_components(model, locator, options)
    }
}

impl<M, L> FaceStylizer<M, L>
where
    M: ModelRunner,
    L: FaceRegionLocator,
{
    /// Assemble a pipeline from already constructed backends.
    pub fn with_components(
        model: M,
        locator: L,
        options: StylizerOptions,
    ) -> Result<Self, StylizerError> {
        options.validate()?;
        let input = model.input_spec();
        let output = model.output_spec();
        debug!(
            "face stylizer ready: {}x{} in, {}x{} out, {} mode",
            input.width, input.height, output.width, output.height, options.execution_mode
        );
        Ok(Self {
            scratch: Vec::with_capacity(output.width as usize * output.height as usize * 4),
            model,
            locator,
            options,
            stage: Stage::Idle,
            timings: StageTimings::default(),
            last_region: None,
        })
    }

    /// Stylize `frame` and return an owned copy of the result.
    pub fn stylize(
        &mut self,
        frame: &ImageFrame<'_>,
    ) -> Result<StylizationResult<'static>, StylizerError> {
        let found = self.run_pipeline(frame)?;
        Ok(self.wrap_output(found, ExecutionMode::Copy).into_owned())
    }

    /// Stylize `frame` and hand the outcome to `handler` before returning its value.
    ///
    /// In [`ExecutionMode::ZeroCopy`] the image borrows this pipeline's output buffer and is
    /// only valid inside `handler`; the next call overwrites it. In [`ExecutionMode::Copy`]
    /// the handler receives an owned image it may keep via
    /// [`StylizationResult::into_owned`].
    pub fn stylize_with<F, R>(&mut self, frame: &ImageFrame<'_>, handler: F) -> R
    where
        F: FnOnce(Result<StylizationResult<'_>, StylizerError>) -> R,
    {
        let outcome = self.run_pipeline(frame);
        let mode = self.options.execution_mode;
        handler(outcome.map(|found| self.wrap_output(found, mode)))
    }

    /// Width and height of every stylized image this pipeline produces.
    pub fn output_size(&self) -> (u32, u32) {
        let spec = self.model.output_spec();
        (spec.width, spec.height)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.options.execution_mode
    }

    pub fn set_execution_mode(&mut self, mode: ExecutionMode) {
        self.options.execution_mode = mode;
    }

    pub fn options(&self) -> &StylizerOptions {
        &self.options
    }

    /// Last stage the previous call completed. Errors leave it at the stage before the failure.
    pub fn last_stage(&self) -> Stage {
        self.stage
    }

    /// Per-stage durations of the previous call.
    pub fn last_timings(&self) -> &StageTimings {
        &self.timings
    }

    /// Face the previous call stylized, in upright frame coordinates.
    pub fn last_region(&self) -> Option<&FaceRegion> {
        self.last_region.as_ref()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn locator(&self) -> &L {
        &self.locator
    }

    fn wrap_output(&self, found: bool, mode: ExecutionMode) -> StylizationResult<'_> {
        if !found {
            return StylizationResult::empty();
        }
        let (width, height) = self.output_size();
        let view = ImageFrame::new(self.scratch.as_slice(), width, height, PixelFormat::Rgba32);
        let image = match mode {
            ExecutionMode::ZeroCopy => view,
            ExecutionMode::Copy => view.into_owned(),
        };
        StylizationResult {
            stylized_image: Some(image),
        }
    }

    /// Run every stage, leaving the stylized pixels in `scratch`. Returns whether a face was found.
    fn run_pipeline(&mut self, frame: &ImageFrame<'_>) -> Result<bool, StylizerError> {
        let _guard = timing_guard("facestyle_core::stylize", Level::Debug);
        self.stage = Stage::Idle;
        self.timings.clear();
        self.last_region = None;

        let started = Instant::now();
        let upright = frame.normalize()?;
        self.timings.record("normalize", started.elapsed());
        trace!(
            "normalized {}x{} {:?} frame rotated {}°",
            frame.width(),
            frame.height(),
            frame.format(),
            frame.rotation().degrees()
        );

        let started = Instant::now();
        let located = self.locator.locate(&upright)?;
        self.timings.record("locate", started.elapsed());
        let Some(region) = located else {
            debug!("no face found in {}x{} frame", upright.width(), upright.height());
            self.stage = Stage::Done;
            return Ok(false);
        };
        self.stage = Stage::RegionLocated;
        trace!(
            "stylizing face at {:?} (score {:.3})",
            region.bbox, region.score
        );

        let started = Instant::now();
        let input_spec = self.model.input_spec();
        let aligned = align_face(
            &upright,
            &region,
            &self.options.align,
            input_spec.width,
            input_spec.height,
        )?;
        let input = image_to_tensor(&aligned, input_spec, self.options.normalization)?;
        self.timings.record("preprocess", started.elapsed());
        self.stage = Stage::Preprocessed;

        let started = Instant::now();
        let output = self.model.run(input)?;
        self.timings.record("inference", started.elapsed());
        self.stage = Stage::Inferred;

        let started = Instant::now();
        tensor_to_rgba(
            &output,
            self.model.output_spec(),
            self.options.normalization,
            &mut self.scratch,
        )?;
        self.timings.record("postprocess", started.elapsed());
        self.stage = Stage::PostProcessed;

        self.last_region = Some(region);
        self.stage = Stage::Done;
        debug!(
            "stylized face in {:.2?} ({} bytes)",
            self.timings.total(),
            self.scratch.len()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::fixtures::{nchw, write_relu_graph};
    use crate::postprocess::{BoundingBox, Landmark};
    use image::{Rgba, RgbaImage};

    fn middle_face(image: &RgbaImage) -> Result<Option<FaceRegion>, InferenceError> {
        let (w, h) = image.dimensions();
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        let mut landmarks = [Landmark { x: cx, y: cy }; 5];
        landmarks[0] = Landmark { x: cx - 4.0, y: cy - 2.0 };
        landmarks[1] = Landmark { x: cx + 4.0, y: cy - 2.0 };
        Ok(Some(FaceRegion {
            bbox: BoundingBox {
                x: cx - 8.0,
                y: cy - 8.0,
                width: 16.0,
                height: 16.0,
            },
            landmarks,
            score: 0.9,
        }))
    }

    #[test]
    fn stylizes_through_an_onnx_graph() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_relu_graph(dir.path(), "relu.onnx", &nchw(8), &nchw(8));
        let model = StylizerModel::load(&path).expect("load");
        let options = StylizerOptions::with_model_path(&path);
        let mut stylizer =
            FaceStylizer::with_components(model, middle_face, options).expect("assemble");
        assert_eq!(stylizer.output_size(), (8, 8));

        let frame = ImageFrame::from_rgba_image(RgbaImage::from_pixel(
            64,
            64,
            Rgba([200, 100, 50, 255]),
        ));
        let result = stylizer.stylize(&frame).expect("stylize");
        let image = result.stylized_image.expect("face found");
        assert_eq!(image.dimensions(), (8, 8));
        assert_eq!(stylizer.last_stage(), Stage::Done);

        // In [-1, 1] space red stays positive while Relu zeroes green and blue to mid-grey.
        for px in image.as_bytes().chunks_exact(4) {
            assert!(px[0].abs_diff(200) <= 1, "red {}", px[0]);
            assert!(px[1].abs_diff(128) <= 1, "green {}", px[1]);
            assert!(px[2].abs_diff(128) <= 1, "blue {}", px[2]);
            assert_eq!(px[3], 255);
        }
    }
}
