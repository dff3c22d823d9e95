//! Inference stage boundary and its ONNX Runtime implementation.

use std::collections::HashMap;

use ndarray::{ArrayD, IxDyn};
use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;

use crate::error::{Error, Result};

/// Ordered list of named tensors exchanged with a stage.
pub type NamedTensors = Vec<(String, ArrayD<f32>)>;

/// A single model invocation in the inpainting chain.
///
/// Stages differ in the input names they accept and the number of outputs
/// they return, so the orchestrator queries [`InferenceStage::input_names`]
/// instead of assuming a fixed signature.
pub trait InferenceStage: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Input names the stage declares.
    fn input_names(&self) -> Vec<String>;

    /// Run the stage. Outputs keep the order the model declares them in.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage rejects its inputs or fails internally.
    fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors>;
}

/// An [`InferenceStage`] backed by an ONNX Runtime session.
pub struct OnnxStage {
    name: String,
    session: Session,
}

impl OnnxStage {
    /// Wrap a loaded session.
    #[must_use]
    pub fn new(name: impl Into<String>, session: Session) -> Self {
        Self {
            name: name.into(),
            session,
        }
    }
}

impl InferenceStage for OnnxStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_names(&self) -> Vec<String> {
        self.session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect()
    }

    fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors> {
        let mut values: Vec<(String, SessionInputValue<'_>)> = Vec::with_capacity(inputs.len());
        for (name, array) in inputs {
            let value = Tensor::from_array(array).map_err(|source| Error::Inference { source })?;
            values.push((name, value.into()));
        }

        let outputs = self
            .session
            .run(values)
            .map_err(|source| Error::Inference { source })?;

        let mut extracted = Vec::new();
        for (name, value) in outputs.iter() {
            extracted.push((name.to_string(), extract_array(&value)?));
        }

        if extracted.is_empty() {
            return Err(Error::StageFailed {
                stage: self.name.clone(),
                reason: "no output".to_string(),
            });
        }

        Ok(extracted)
    }
}

/// Extract a dynamic-rank array from an ONNX value.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn extract_array(value: &ort::value::ValueRef<'_>) -> Result<ArrayD<f32>> {
    let (shape_info, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|source| Error::Inference { source })?;

    // Safe: tensor dimensions are always non-negative and within bounds
    let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();

    ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec()).map_err(|_| Error::ShapeMismatch {
        expected: format!("{dims:?}"),
        actual: format!("{} elements", data.len()),
    })
}

/// Take the first output of a stage.
///
/// # Errors
///
/// Returns [`Error::StageFailed`] if the stage produced no outputs.
pub fn first_output(stage: &str, outputs: NamedTensors) -> Result<ArrayD<f32>> {
    outputs
        .into_iter()
        .next()
        .map(|(_, tensor)| tensor)
        .ok_or_else(|| Error::StageFailed {
            stage: stage.to_string(),
            reason: "no output".to_string(),
        })
}

/// Select the tensors a stage declares as inputs, by name.
///
/// Outputs not requested are dropped. The result follows the order of
/// `required`.
///
/// # Errors
///
/// Returns [`Error::MissingInput`] for the first declared name with no
/// matching tensor.
pub fn match_inputs(stage: &str, required: &[String], available: NamedTensors) -> Result<NamedTensors> {
    let mut by_name: HashMap<String, ArrayD<f32>> = available.into_iter().collect();

    required
        .iter()
        .map(|name| {
            by_name
                .remove(name)
                .map(|tensor| (name.clone(), tensor))
                .ok_or_else(|| Error::MissingInput {
                    stage: stage.to_string(),
                    name: name.clone(),
                })
        })
        .collect()
}
