//! Detector configuration
//!
//! A single JSON document selects the normalization variant and the
//! interpretation policy for one deployed model.

use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::interpret::InterpretPolicy;
use crate::normalizer::{
    Normalizer, ScalerParameters, StandardScaler, UnitScaler, DEFAULT_UNIT_DIVISORS,
    DEPLOYED_MEAN, DEPLOYED_SCALE,
};
use crate::types::FEATURE_COUNT;

/// Normalization variant applied before inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizerConfig {
    /// Z-score standardization with fitted statistics
    Standard { mean: Vec<f32>, scale: Vec<f32> },
    /// Fixed per-feature divisors
    Unit {
        #[serde(default = "default_divisors")]
        divisors: [f32; FEATURE_COUNT],
    },
}

fn default_divisors() -> [f32; FEATURE_COUNT] {
    DEFAULT_UNIT_DIVISORS
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig::Standard {
            mean: DEPLOYED_MEAN.to_vec(),
            scale: DEPLOYED_SCALE.to_vec(),
        }
    }
}

impl NormalizerConfig {
    /// Build the configured normalizer
    pub fn build(&self) -> Result<Box<dyn Normalizer>, DetectError> {
        match self {
            NormalizerConfig::Standard { mean, scale } => {
                let params = ScalerParameters::new(mean.clone(), scale.clone());
                Ok(Box::new(StandardScaler::new(params)?))
            }
            NormalizerConfig::Unit { divisors } => {
                if divisors.iter().any(|d| !d.is_finite()) {
                    return Err(DetectError::Config(
                        "unit divisors must be finite".to_string(),
                    ));
                }
                Ok(Box::new(UnitScaler::new(*divisors)))
            }
        }
    }
}

/// Complete configuration of a [`crate::FraudDetector`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorConfig {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub interpret: InterpretPolicy,
}

impl DetectorConfig {
    /// Parse and validate a configuration document
    pub fn from_json(json: &str) -> Result<Self, DetectError> {
        let config: DetectorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, DetectError> {
        serde_json::to_string_pretty(self).map_err(DetectError::JsonError)
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        self.normalizer.build()?;
        self.interpret.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::ConfidencePolicy;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_round_trips() {
        let config = DetectorConfig::default();
        let json = config.to_json().unwrap();
        let parsed = DetectorConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DetectorConfig::from_json("{}").unwrap();
        assert_eq!(config, DetectorConfig::default());
        assert_eq!(config.normalizer.build().unwrap().name(), "standard");
    }

    #[test]
    fn test_unit_config() {
        let config = DetectorConfig::from_json(
            r#"{
                "normalizer": { "kind": "unit" },
                "interpret": { "confidence": "margin_distance" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.normalizer,
            NormalizerConfig::Unit {
                divisors: [1000.0, 1000.0, 1.0, 360.0]
            }
        );
        assert_eq!(config.interpret.confidence, ConfidencePolicy::MarginDistance);
        assert_eq!(config.interpret.threshold, 0.5);
        assert_eq!(config.normalizer.build().unwrap().name(), "unit");
    }

    #[test]
    fn test_rejects_short_scaler() {
        let err = DetectorConfig::from_json(
            r#"{"normalizer": {"kind": "standard", "mean": [1, 2, 3], "scale": [1, 1, 1]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DetectError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let err = DetectorConfig::from_json(r#"{"interpret": {"threshold": 0.0}}"#).unwrap_err();
        assert!(matches!(err, DetectError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = DetectorConfig::from_json(r#"{"normaliser": {}}"#).unwrap_err();
        assert!(matches!(err, DetectError::JsonError(_)));
    }
}
