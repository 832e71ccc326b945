//! ONNX Runtime session management and inference for the classifier.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::error::{InferenceError, ModelLoadError};

/// Preferred name of the classification output.
const LOGITS_OUTPUT: &str = "logits";

/// Wraps an ONNX Runtime session for image classification.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`. The lock is
/// held only for the forward pass; input tensors are built by the caller.
pub struct ClassifierSession {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
}

impl ClassifierSession {
    /// Load a classifier exported to ONNX.
    pub fn load(model_path: &Path) -> Result<Self, ModelLoadError> {
        let session = Session::builder()
            .map_err(|e| ModelLoadError::Session {
                path: model_path.to_path_buf(),
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(model_path)
            .map_err(|e| ModelLoadError::Session {
                path: model_path.to_path_buf(),
                message: format!("Failed to load ONNX model: {e}"),
            })?;

        // Detect the input tensor name from model metadata.
        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        tracing::debug!(
            "Loaded classifier from {:?} (input: {:?}, outputs: {:?})",
            model_path,
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>()
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    /// Run a forward pass and return the raw logits for the single image.
    ///
    /// Input shape: \[1, 3, H, W\] (NCHW, already normalized).
    pub fn logits(&self, preprocessed: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = preprocessed.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = preprocessed.iter().copied().collect();

        let input_value = Value::from_array((shape, flat_data))
            .map_err(|e| InferenceError::Tensor(e.to_string()))?;

        let inputs = ort::inputs![self.input_name.as_str() => input_value];

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::LockPoisoned)?;

        let outputs = session
            .run(inputs)
            .map_err(|e| InferenceError::Run(e.to_string()))?;

        // Prefer the output named "logits"; fall back to the first output for
        // exports that renamed it.
        let logits = outputs
            .iter()
            .find(|(name, _)| *name == LOGITS_OUTPUT)
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| InferenceError::Output("model produced no outputs".to_string()))?;

        let (shape, data) = logits
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Output(format!("Failed to extract logits: {e}")))?;

        // Logits are [1, num_classes]; take the single row.
        match shape.len() {
            1 => Ok(data.to_vec()),
            2 if shape[0] == 1 => Ok(data[..shape[1] as usize].to_vec()),
            _ => Err(InferenceError::Output(format!(
                "Unexpected logits shape: {:?}",
                shape
            ))),
        }
    }
}
