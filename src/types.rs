//! Core data types
//!
//! This module defines the feature vector, raw caller input and verdict types
//! that flow through the scoring pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Number of behavioral features the classifier consumes
pub const FEATURE_COUNT: usize = 4;

/// Behavioral features, in the order the classifier expects them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Characters per sampling interval
    TypingSpeed,
    /// Pixels per sampling interval
    SwipeSpeed,
    /// Touch pressure as reported by the device
    TapPressure,
    /// Device tilt in degrees
    DeviceAngle,
}

impl Feature {
    /// All features in model input order
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::TypingSpeed,
        Feature::SwipeSpeed,
        Feature::TapPressure,
        Feature::DeviceAngle,
    ];

    /// Field name used in error messages and JSON payloads
    pub fn name(self) -> &'static str {
        match self {
            Feature::TypingSpeed => "typing_speed",
            Feature::SwipeSpeed => "swipe_speed",
            Feature::TapPressure => "tap_pressure",
            Feature::DeviceAngle => "device_angle",
        }
    }

    /// Position of the feature in the model input
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-order vector of the four behavioral features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f32; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn get(&self, feature: Feature) -> f32 {
        self.0[feature.index()]
    }

    pub fn as_array(&self) -> &[f32; FEATURE_COUNT] {
        &self.0
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Build a vector from a slice, rejecting anything that is not exactly four values
    pub fn from_slice(values: &[f32]) -> Result<Self, crate::DetectError> {
        let array: [f32; FEATURE_COUNT] =
            values
                .try_into()
                .map_err(|_| crate::DetectError::DimensionMismatch {
                    expected: FEATURE_COUNT,
                    actual: values.len(),
                })?;
        Ok(Self(array))
    }
}

impl From<[f32; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f32; FEATURE_COUNT]) -> Self {
        Self(values)
    }
}

/// Raw, unvalidated text supplied by the caller for one prediction request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInputs {
    #[serde(default, deserialize_with = "text_or_number")]
    pub typing_speed: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub swipe_speed: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub tap_pressure: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub device_angle: String,
}

impl RawInputs {
    pub fn new(
        typing_speed: impl Into<String>,
        swipe_speed: impl Into<String>,
        tap_pressure: impl Into<String>,
        device_angle: impl Into<String>,
    ) -> Self {
        Self {
            typing_speed: typing_speed.into(),
            swipe_speed: swipe_speed.into(),
            tap_pressure: tap_pressure.into(),
            device_angle: device_angle.into(),
        }
    }

    /// Fields paired with their feature, in model input order
    pub fn fields(&self) -> [(Feature, &str); FEATURE_COUNT] {
        [
            (Feature::TypingSpeed, self.typing_speed.as_str()),
            (Feature::SwipeSpeed, self.swipe_speed.as_str()),
            (Feature::TapPressure, self.tap_pressure.as_str()),
            (Feature::DeviceAngle, self.device_angle.as_str()),
        ]
    }
}

/// Batch producers send either JSON strings or bare numbers
fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawField {
        Text(String),
        Number(f64),
    }

    Ok(match RawField::deserialize(deserializer)? {
        RawField::Text(text) => text,
        RawField::Number(number) => number.to_string(),
    })
}

/// Classification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Fraud,
    Normal,
}

impl Label {
    pub fn is_fraud(self) -> bool {
        matches!(self, Label::Fraud)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Fraud => f.write_str("FRAUD"),
            Label::Normal => f.write_str("NORMAL"),
        }
    }
}

/// Human-presentable result of one prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    /// Percentage in [0, 100]
    pub confidence: f32,
    /// Classifier output, nominally a fraud probability in [0, 1]
    pub raw_score: f32,
}

impl Verdict {
    /// First line of the rendered verdict
    pub fn headline(&self) -> &'static str {
        match self.label {
            Label::Fraud => "FRAUD DETECTED",
            Label::Normal => "NORMAL BEHAVIOR",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\nConfidence: {:.1}%\nRisk Score: {:.3}",
            self.headline(),
            self.confidence,
            self.raw_score
        )
    }
}

/// A verdict together with the model-ready vector it was computed from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub verdict: Verdict,
    pub raw: FeatureVector,
    pub normalized: FeatureVector,
    /// Name of the normalizer that produced `normalized`
    pub normalizer: &'static str,
}
