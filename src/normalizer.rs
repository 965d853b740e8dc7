//! Feature normalization
//!
//! Maps raw behavioral measurements into the distribution the classifier was
//! trained on. Two variants implement the same [`Normalizer`] contract:
//! - [`StandardScaler`]: z-score standardization with training-time statistics
//! - [`UnitScaler`]: fixed per-feature divisors (no learned statistics)
//!
//! Both treat a zero denominator as a degenerate feature and emit 0.

use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::types::{FeatureVector, FEATURE_COUNT};

/// Training-time means of the deployed behavior model
pub const DEPLOYED_MEAN: [f32; FEATURE_COUNT] = [45.65, 321.49, 0.556, 34.72];

/// Training-time scales (standard deviations) of the deployed behavior model
pub const DEPLOYED_SCALE: [f32; FEATURE_COUNT] = [9.29, 55.26, 0.115, 10.82];

/// Per-feature divisors for unit scaling: typing and swipe speed per thousand,
/// tap pressure unchanged, angle as a fraction of a full turn
pub const DEFAULT_UNIT_DIVISORS: [f32; FEATURE_COUNT] = [1000.0, 1000.0, 1.0, 360.0];

/// Transform from raw features to model-ready features
pub trait Normalizer {
    /// Normalize a raw feature vector
    fn transform(&self, raw: &FeatureVector) -> Result<FeatureVector, DetectError>;

    /// Short identifier used in logs and reports
    fn name(&self) -> &'static str;
}

/// Mean/scale pair produced when the scaler was fitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParameters {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl Default for ScalerParameters {
    fn default() -> Self {
        Self::deployed()
    }
}

impl ScalerParameters {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Self {
        Self { mean, scale }
    }

    /// Constants shipped with the current behavior model
    pub fn deployed() -> Self {
        Self {
            mean: DEPLOYED_MEAN.to_vec(),
            scale: DEPLOYED_SCALE.to_vec(),
        }
    }

    /// Check that both sequences cover every feature with finite values
    pub fn validate(&self) -> Result<(), DetectError> {
        for (name, values) in [("mean", &self.mean), ("scale", &self.scale)] {
            if values.len() != FEATURE_COUNT {
                return Err(DetectError::DimensionMismatch {
                    expected: FEATURE_COUNT,
                    actual: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(DetectError::Config(format!(
                    "scaler {name} contains a non-finite value"
                )));
            }
        }
        Ok(())
    }
}

/// Z-score standardize `raw` with `params`.
///
/// `out[i] = (raw[i] - mean[i]) / scale[i]`, or exactly 0 when `scale[i] == 0`.
pub fn standardize(raw: &[f32], params: &ScalerParameters) -> Result<Vec<f32>, DetectError> {
    if raw.len() != params.mean.len() {
        return Err(DetectError::DimensionMismatch {
            expected: params.mean.len(),
            actual: raw.len(),
        });
    }
    if params.scale.len() != params.mean.len() {
        return Err(DetectError::DimensionMismatch {
            expected: params.mean.len(),
            actual: params.scale.len(),
        });
    }

    Ok(raw
        .iter()
        .zip(params.mean.iter().zip(params.scale.iter()))
        .map(|(&x, (&mean, &scale))| scaled(x - mean, scale))
        .collect())
}

#[inline]
fn scaled(numerator: f32, denominator: f32) -> f32 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Standardization with fitted mean/scale statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    params: ScalerParameters,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self {
            params: ScalerParameters::deployed(),
        }
    }
}

impl StandardScaler {
    /// Create a scaler, rejecting parameters that do not cover every feature
    pub fn new(params: ScalerParameters) -> Result<Self, DetectError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ScalerParameters {
        &self.params
    }
}

impl Normalizer for StandardScaler {
    fn transform(&self, raw: &FeatureVector) -> Result<FeatureVector, DetectError> {
        let out = standardize(raw.as_slice(), &self.params)?;
        FeatureVector::from_slice(&out)
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

/// Fixed-divisor unit scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScaler {
    divisors: [f32; FEATURE_COUNT],
}

impl Default for UnitScaler {
    fn default() -> Self {
        Self {
            divisors: DEFAULT_UNIT_DIVISORS,
        }
    }
}

impl UnitScaler {
    pub fn new(divisors: [f32; FEATURE_COUNT]) -> Self {
        Self { divisors }
    }

    pub fn divisors(&self) -> &[f32; FEATURE_COUNT] {
        &self.divisors
    }
}

impl Normalizer for UnitScaler {
    fn transform(&self, raw: &FeatureVector) -> Result<FeatureVector, DetectError> {
        let mut out = [0.0f32; FEATURE_COUNT];
        for (slot, (&x, &divisor)) in out
            .iter_mut()
            .zip(raw.as_array().iter().zip(self.divisors.iter()))
        {
            *slot = scaled(x, divisor);
        }
        Ok(FeatureVector::new(out))
    }

    fn name(&self) -> &'static str {
        "unit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_standardize_deployed_example() {
        let scaler = StandardScaler::default();
        let raw = FeatureVector::new([45.0, 320.0, 0.55, 35.0]);

        let out = scaler.transform(&raw).unwrap();
        let expected = [-0.070, -0.027, -0.052, 0.026];
        for (got, want) in out.as_array().iter().zip(expected.iter()) {
            assert!(approx(*got, *want), "got {got}, want {want}");
        }
    }

    #[test]
    fn test_zero_scale_yields_zero() {
        let params = ScalerParameters::new(vec![1.0, 2.0, 3.0, 4.0], vec![0.0, 1.0, 0.0, 2.0]);
        let scaler = StandardScaler::new(params).unwrap();

        for raw in [
            [100.0, 5.0, -7.5, 8.0],
            [f32::MAX, 5.0, f32::MIN, 8.0],
            [0.0, 0.0, 0.0, 0.0],
        ] {
            let out = scaler.transform(&FeatureVector::new(raw)).unwrap();
            assert_eq!(out.as_array()[0], 0.0);
            assert_eq!(out.as_array()[2], 0.0);
        }
    }

    #[test]
    fn test_standardize_is_deterministic() {
        let scaler = StandardScaler::default();
        let raw = FeatureVector::new([51.3, 298.7, 0.61, 12.0]);

        let first = scaler.transform(&raw).unwrap();
        let second = scaler.transform(&raw).unwrap();
        for (a, b) in first.as_array().iter().zip(second.as_array().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_standardize_dimension_mismatch() {
        let params = ScalerParameters::new(vec![0.0; 4], vec![1.0; 4]);
        let err = standardize(&[1.0, 2.0, 3.0], &params).unwrap_err();
        assert!(matches!(
            err,
            DetectError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));

        let params = ScalerParameters::new(vec![0.0; 4], vec![1.0; 3]);
        assert!(standardize(&[1.0, 2.0, 3.0, 4.0], &params).is_err());
    }

    #[test]
    fn test_scaler_rejects_short_parameters() {
        let params = ScalerParameters::new(vec![0.0; 3], vec![1.0; 3]);
        assert!(matches!(
            StandardScaler::new(params),
            Err(DetectError::DimensionMismatch { .. })
        ));

        let params = ScalerParameters::new(vec![0.0, f32::NAN, 0.0, 0.0], vec![1.0; 4]);
        assert!(matches!(
            StandardScaler::new(params),
            Err(DetectError::Config(_))
        ));
    }

    #[test]
    fn test_unit_scaler_defaults() {
        let scaler = UnitScaler::default();
        let out = scaler
            .transform(&FeatureVector::new([450.0, 1200.0, 0.55, 90.0]))
            .unwrap();

        assert_eq!(out.as_array(), &[0.45, 1.2, 0.55, 0.25]);
    }

    #[test]
    fn test_unit_scaler_zero_divisor() {
        let scaler = UnitScaler::new([0.0, 1.0, 1.0, 1.0]);
        let out = scaler
            .transform(&FeatureVector::new([42.0, 1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(out.as_array(), &[0.0, 1.0, 2.0, 3.0]);
    }
}
