//! ONNX Runtime backend
//!
//! Runs the exported behavior model with `ort`. The model takes a `[1, 4]` f32
//! tensor and its first output holds the sigmoid fraud score.

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

use crate::classifier::{Classifier, ModelRuntime};
use crate::error::DetectError;
use crate::types::{FeatureVector, FEATURE_COUNT};

/// ONNX Runtime session built from the model asset
pub struct OnnxRuntime {
    session: Session,
    output_name: String,
}

impl ModelRuntime for OnnxRuntime {
    const NAME: &'static str = "onnx";

    fn load(model: &[u8]) -> Result<Self, DetectError> {
        log::debug!("building ONNX session from {} bytes", model.len());

        let session = Session::builder()
            .map_err(|e| DetectError::ModelLoad(format!("session builder error: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DetectError::ModelLoad(format!("optimization error: {e}")))?
            .commit_from_memory(model)
            .map_err(|e| DetectError::ModelLoad(format!("load from memory error: {e}")))?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| DetectError::ModelLoad("model defines no outputs".to_string()))?;

        Ok(Self {
            session,
            output_name,
        })
    }
}

impl Classifier for OnnxRuntime {
    fn run(&mut self, input: &FeatureVector) -> Result<f32, DetectError> {
        let array = Array2::<f32>::from_shape_vec((1, FEATURE_COUNT), input.as_slice().to_vec())
            .map_err(|e| DetectError::Inference(format!("array error: {e}")))?;

        let tensor = Value::from_array(array)
            .map_err(|e| DetectError::Inference(format!("tensor error: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectError::Inference(format!("inference failed: {e}")))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| DetectError::Inference("no output".to_string()))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("extract error: {e}")))?;

        data.first()
            .copied()
            .ok_or_else(|| DetectError::Inference("empty output tensor".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_garbage_model_is_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not an onnx graph").unwrap();
        file.flush().unwrap();

        let err = crate::classifier::ClassifierHandle::open::<OnnxRuntime>(file.path())
            .unwrap_err();
        assert!(matches!(err, DetectError::ModelLoad(_)));
    }
}
