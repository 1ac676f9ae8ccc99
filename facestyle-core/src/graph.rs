//! ONNX graph loading shared by the stylizer model and the YuNet face locator.

use std::path::Path;

use log::{debug, warn};
use tract_onnx::prelude::{
    DatumType, Framework, Graph, InferenceModelExt, SimplePlan, SymbolValues, TDim, TypedFact,
    TypedModel, TypedOp,
};

use crate::error::LoadError;

pub(crate) type RunnableModel =
    SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Parse an ONNX file and turn it into a runnable plan.
///
/// `bind(axis)` gives the value for a symbolic axis of the first input (a dynamic batch
/// axis, say); axes it returns `None` for stay as declared. The optimized plan is
/// preferred; graphs that fail to optimize fall back to a decluttered plan, which runs
/// roughly 2x slower but accepts more operator combinations.
pub(crate) fn load_runnable(
    path: &Path,
    label: &str,
    bind: impl Fn(usize) -> Option<usize>,
) -> Result<RunnableModel, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let model = tract_onnx::onnx()
        .model_for_path(path)
        .map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            reason: format!("{e:#}"),
        })?;
    let typed = model.into_typed().map_err(|e| LoadError::Incompatible {
        path: path.to_path_buf(),
        reason: format!("unable to type graph: {e:#}"),
    })?;
    let typed = bind_input_dims(typed, path, label, bind)?;

    let optimized = typed
        .clone()
        .into_optimized()
        .and_then(|typed| typed.into_runnable());
    match optimized {
        Ok(plan) => {
            debug!("{label} model {} optimized successfully", path.display());
            Ok(plan)
        }
        Err(opt_err) => {
            warn!(
                "{label} model {} failed optimized load ({opt_err}); falling back to decluttered graph (~2x slower)",
                path.display()
            );
            typed
                .into_decluttered()
                .and_then(|typed| typed.into_runnable())
                .map_err(|e| LoadError::Incompatible {
                    path: path.to_path_buf(),
                    reason: format!("unable to build runnable graph after optimize error ({opt_err}): {e}"),
                })
        }
    }
}

fn bind_input_dims(
    model: TypedModel,
    path: &Path,
    label: &str,
    bind: impl Fn(usize) -> Option<usize>,
) -> Result<TypedModel, LoadError> {
    let Ok(fact) = model.input_fact(0) else {
        return Ok(model);
    };

    let mut values = SymbolValues::default();
    let mut bound = false;
    for (axis, dim) in fact.shape.iter().enumerate() {
        if let (TDim::Sym(symbol), Some(value)) = (dim, bind(axis)) {
            debug!("{label} model {}: binding input axis {axis} ({symbol}) to {value}", path.display());
            values = values.with(symbol, value as i64);
            bound = true;
        }
    }
    if !bound {
        return Ok(model);
    }

    model
        .concretize_dims(&values)
        .map_err(|e| LoadError::Incompatible {
            path: path.to_path_buf(),
            reason: format!("unable to bind symbolic input dims: {e:#}"),
        })
}

/// Concrete shape of an `f32` input or output, if the graph declares one.
pub(crate) fn concrete_f32_shape(fact: &TypedFact) -> Option<Vec<usize>> {
    if fact.datum_type != DatumType::F32 {
        return None;
    }
    fact.shape.as_concrete().map(|dims| dims.to_vec())
}
