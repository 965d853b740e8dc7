//! Error types for Nirbhay

use thiserror::Error;

/// Errors that can occur while scoring a behavioral sample
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid number for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DetectError {
    /// Stable machine-readable code for the error variant
    pub fn kind(&self) -> &'static str {
        match self {
            DetectError::MissingField { .. } => "missing_field",
            DetectError::InvalidNumber { .. } => "invalid_number",
            DetectError::DimensionMismatch { .. } => "dimension_mismatch",
            DetectError::Inference(_) => "inference_error",
            DetectError::ModelLoad(_) => "model_load_error",
            DetectError::Config(_) => "config_error",
            DetectError::JsonError(_) => "json_error",
        }
    }

    /// Name of the offending input field, if the error is tied to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DetectError::MissingField { field } | DetectError::InvalidNumber { field, .. } => {
                Some(*field)
            }
            _ => None,
        }
    }

    /// Whether the error was caused by the caller's input rather than configuration or runtime
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DetectError::MissingField { .. } | DetectError::InvalidNumber { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_field() {
        let err = DetectError::MissingField {
            field: "swipe_speed",
        };
        assert_eq!(err.kind(), "missing_field");
        assert_eq!(err.field(), Some("swipe_speed"));
        assert!(err.is_input_error());

        let err = DetectError::Inference("runtime failed".to_string());
        assert_eq!(err.kind(), "inference_error");
        assert_eq!(err.field(), None);
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_display_messages() {
        let err = DetectError::InvalidNumber {
            field: "typing_speed",
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid number for typing_speed: \"abc\"");

        let err = DetectError::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: expected 4 values, got 3"
        );
    }
}
