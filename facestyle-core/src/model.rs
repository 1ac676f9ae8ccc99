use std::path::Path;

use log::debug;
use tract_onnx::prelude::{IntoTensor, Tensor, tvec};

use crate::error::{InferenceError, LoadError};
use crate::graph::{RunnableModel, concrete_f32_shape, load_runnable};

/// Memory layout of a single-image, three-channel tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`
    Nchw,
    /// `[1, H, W, 3]`
    Nhwc,
}

/// Declared geometry of a model input or output image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorSpec {
    pub layout: TensorLayout,
    pub width: u32,
    pub height: u32,
}

impl TensorSpec {
    pub const fn new(layout: TensorLayout, width: u32, height: u32) -> Self {
        Self {
            layout,
            width,
            height,
        }
    }

    /// Full tensor shape including batch and channel axes.
    pub fn shape(&self) -> [usize; 4] {
        let (w, h) = (self.width as usize, self.height as usize);
        match self.layout {
            TensorLayout::Nchw => [1, 3, h, w],
            TensorLayout::Nhwc => [1, h, w, 3],
        }
    }

    /// Interpret a 4-D shape as a batch-1 RGB image tensor.
    ///
    /// Shapes that read both ways (`[1, 3, H, 3]`) resolve to NCHW.
    pub fn from_shape(shape: &[usize]) -> Option<Self> {
        let to_u32 = |v: usize| u32::try_from(v).ok().filter(|v| *v > 0);
        match *shape {
            [1, 3, h, w] => Some(Self::new(TensorLayout::Nchw, to_u32(w)?, to_u32(h)?)),
            [1, h, w, 3] => Some(Self::new(TensorLayout::Nhwc, to_u32(w)?, to_u32(h)?)),
            _ => None,
        }
    }

    pub fn element_count(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Forward inference over image tensors.
///
/// One call at a time per instance; callers that share a runner across threads must
/// serialize access themselves.
pub trait ModelRunner: Send {
    /// Geometry the runner expects on its input.
    fn input_spec(&self) -> TensorSpec;

    /// Geometry the runner produces; stylized images have exactly this size.
    fn output_spec(&self) -> TensorSpec;

    /// Execute the model. The input must match [`input_spec`](Self::input_spec).
    fn run(&self, input: Tensor) -> Result<Tensor, InferenceError>;
}

/// Ensure `tensor` has exactly the shape declared by `spec`.
pub fn check_shape(tensor: &Tensor, spec: &TensorSpec) -> Result<(), InferenceError> {
    let expected = spec.shape();
    if tensor.shape() != expected.as_slice() {
        return Err(InferenceError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: tensor.shape().to_vec(),
        });
    }
    Ok(())
}

/// Stylization network executed with `tract-onnx`.
///
/// The graph must take one `f32` image tensor and return one, both batch-1 RGB shapes
/// with concrete height and width. A symbolic batch axis is bound to 1 at load time.
/// Output width and height come from the graph's output fact.
#[derive(Debug)]
pub struct StylizerModel {
    runnable: RunnableModel,
    input: TensorSpec,
    output: TensorSpec,
}

impl StylizerModel {
    /// Load and validate a stylizer graph.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self, LoadError> {
        let path = model_path.as_ref();
        // Dynamic batch axes run with a single image.
        let runnable = load_runnable(path, "stylizer", |axis| (axis == 0).then_some(1))?;

        let incompatible = |reason: String| LoadError::Incompatible {
            path: path.to_path_buf(),
            reason,
        };
        let graph = runnable.model();
        if graph.inputs.len() != 1 || graph.outputs.len() != 1 {
            return Err(incompatible(format!(
                "expected 1 input and 1 output, found {} and {}",
                graph.inputs.len(),
                graph.outputs.len()
            )));
        }

        let input_fact = graph
            .input_fact(0)
            .map_err(|e| incompatible(format!("unreadable input fact: {e}")))?;
        let input = concrete_f32_shape(input_fact)
            .and_then(|shape| TensorSpec::from_shape(&shape))
            .ok_or_else(|| {
                incompatible(format!(
                    "input must be f32 [1,3,H,W] or [1,H,W,3], found {input_fact:?}"
                ))
            })?;

        let output_fact = graph
            .output_fact(0)
            .map_err(|e| incompatible(format!("unreadable output fact: {e}")))?;
        let output = concrete_f32_shape(output_fact)
            .and_then(|shape| TensorSpec::from_shape(&shape))
            .ok_or_else(|| {
                incompatible(format!(
                    "output must be f32 [1,3,H,W] or [1,H,W,3], found {output_fact:?}"
                ))
            })?;

        debug!(
            "stylizer model {} ready: input {:?} {}x{}, output {:?} {}x{}",
            path.display(),
            input.layout,
            input.width,
            input.height,
            output.layout,
            output.width,
            output.height
        );

        Ok(Self {
            runnable,
            input,
            output,
        })
    }
}

impl ModelRunner for StylizerModel {
    fn input_spec(&self) -> TensorSpec {
        self.input
    }

    fn output_spec(&self) -> TensorSpec {
        self.output
    }

    fn run(&self, input: Tensor) -> Result<Tensor, InferenceError> {
        check_shape(&input, &self.input)?;

        let mut outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| InferenceError::Backend(format!("{e:#}")))?;
        let output = outputs
            .pop()
            .ok_or_else(|| InferenceError::Backend("model produced no outputs".into()))?
            .into_tensor();

        check_shape(&output, &self.output)?;
        Ok(output)
    }
}
