//! Verdict report encoder
//!
//! Wraps a [`Prediction`] in a self-describing JSON report for hosts that
//! render or log verdicts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DetectError;
use crate::types::{Feature, FeatureVector, Label, Prediction};
use crate::{NIRBHAY_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub verdict: ReportVerdict,
    pub features: ReportFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportVerdict {
    pub label: Label,
    pub headline: String,
    pub confidence: f32,
    pub risk_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFeatures {
    pub normalizer: String,
    pub raw: NamedFeatures,
    pub normalized: NamedFeatures,
}

/// Feature values keyed by name
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NamedFeatures {
    pub typing_speed: f32,
    pub swipe_speed: f32,
    pub tap_pressure: f32,
    pub device_angle: f32,
}

impl From<&FeatureVector> for NamedFeatures {
    fn from(vector: &FeatureVector) -> Self {
        Self {
            typing_speed: vector.get(Feature::TypingSpeed),
            swipe_speed: vector.get(Feature::SwipeSpeed),
            tap_pressure: vector.get(Feature::TapPressure),
            device_angle: vector.get(Feature::DeviceAngle),
        }
    }
}

/// Verdict report encoder
pub struct VerdictEncoder {
    instance_id: String,
}

impl Default for VerdictEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a prediction into a report
    pub fn encode(&self, prediction: &Prediction) -> VerdictReport {
        let verdict = &prediction.verdict;

        VerdictReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: NIRBHAY_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            verdict: ReportVerdict {
                label: verdict.label,
                headline: verdict.headline().to_string(),
                confidence: verdict.confidence,
                risk_score: verdict.raw_score,
            },
            features: ReportFeatures {
                normalizer: prediction.normalizer.to_string(),
                raw: NamedFeatures::from(&prediction.raw),
                normalized: NamedFeatures::from(&prediction.normalized),
            },
        }
    }

    /// Encode to a compact JSON string
    pub fn encode_to_json(&self, prediction: &Prediction) -> Result<String, DetectError> {
        serde_json::to_string(&self.encode(prediction)).map_err(DetectError::JsonError)
    }
}
