//! Verdict interpretation
//!
//! Turns the classifier's scalar output into a labeled, confidence-scored verdict.

use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::types::{Label, Verdict};

/// Default decision boundary for the sigmoid output
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// How confidence is derived from the raw score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidencePolicy {
    /// Probability of the predicted class: `score` for fraud, `1 - score` for normal.
    /// Ranges over (50, 100] with the default threshold.
    #[default]
    PoleDistance,
    /// Distance from the decision boundary, scaled so the boundary is 0 and
    /// either extreme is 100. Equals `|score - 0.5| * 200` at the default threshold.
    MarginDistance,
}

/// Threshold and confidence policy applied to every raw score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpretPolicy {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub confidence: ConfidencePolicy,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

impl Default for InterpretPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            confidence: ConfidencePolicy::default(),
        }
    }
}

impl InterpretPolicy {
    pub fn with_confidence(confidence: ConfidencePolicy) -> Self {
        Self {
            confidence,
            ..Self::default()
        }
    }

    /// Threshold must sit strictly inside (0, 1)
    pub fn validate(&self) -> Result<(), DetectError> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(DetectError::Config(format!(
                "threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Interpret a raw classifier score.
///
/// The label is fraud iff `raw_score > threshold`. Finite scores outside [0, 1]
/// are kept as-is in the verdict; only the confidence is clamped.
pub fn interpret(raw_score: f32, policy: &InterpretPolicy) -> Result<Verdict, DetectError> {
    if !raw_score.is_finite() {
        return Err(DetectError::Inference(format!(
            "classifier returned a non-finite score: {raw_score}"
        )));
    }
    if !(0.0..=1.0).contains(&raw_score) {
        log::warn!("classifier score {raw_score} outside [0, 1]; confidence will be clamped");
    }

    let threshold = policy.threshold;
    let label = if raw_score > threshold {
        Label::Fraud
    } else {
        Label::Normal
    };

    let confidence = match (policy.confidence, label) {
        (ConfidencePolicy::PoleDistance, Label::Fraud) => raw_score * 100.0,
        (ConfidencePolicy::PoleDistance, Label::Normal) => (1.0 - raw_score) * 100.0,
        (ConfidencePolicy::MarginDistance, Label::Fraud) => {
            (raw_score - threshold) / (1.0 - threshold) * 100.0
        }
        (ConfidencePolicy::MarginDistance, Label::Normal) => {
            (threshold - raw_score) / threshold * 100.0
        }
    };

    Ok(Verdict {
        label,
        confidence: confidence.clamp(0.0, 100.0),
        raw_score,
    })
}
