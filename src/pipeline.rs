//! Pipeline orchestration
//!
//! This module provides the public scoring API.
//! It orchestrates one request from raw caller text to a verdict:
//! presence check → numeric parse → normalize → classify → interpret.

use std::path::Path;

use crate::classifier::{Classifier, ClassifierHandle, ModelRuntime};
use crate::config::DetectorConfig;
use crate::error::DetectError;
use crate::interpret::{interpret, InterpretPolicy};
use crate::normalizer::Normalizer;
use crate::types::{Feature, FeatureVector, Prediction, RawInputs, Verdict, FEATURE_COUNT};

/// Validate and parse the four raw fields.
///
/// Every field is checked for presence before any is parsed, so a blank field
/// is reported even when an earlier field is also malformed.
pub fn parse_inputs(raw: &RawInputs) -> Result<FeatureVector, DetectError> {
    let fields = raw.fields();

    // Stage 1: presence
    for (feature, text) in fields.iter() {
        if text.trim().is_empty() {
            return Err(DetectError::MissingField {
                field: feature.name(),
            });
        }
    }

    // Stage 2: finite numbers
    let mut values = [0.0f32; FEATURE_COUNT];
    for (slot, (feature, text)) in values.iter_mut().zip(fields.iter()) {
        *slot = parse_value(*feature, text.trim())?;
    }

    Ok(FeatureVector::new(values))
}

fn parse_value(feature: Feature, text: &str) -> Result<f32, DetectError> {
    match text.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(DetectError::InvalidNumber {
            field: feature.name(),
            value: text.to_string(),
        }),
    }
}

/// Reject non-finite values supplied directly as numbers
pub(crate) fn check_finite(values: [f32; FEATURE_COUNT]) -> Result<FeatureVector, DetectError> {
    for (feature, value) in Feature::ALL.iter().zip(values.iter()) {
        if !value.is_finite() {
            return Err(DetectError::InvalidNumber {
                field: feature.name(),
                value: value.to_string(),
            });
        }
    }
    Ok(FeatureVector::new(values))
}

/// Normalize, classify and interpret an already validated vector
fn score(
    raw: FeatureVector,
    normalizer: &dyn Normalizer,
    classifier: &mut dyn Classifier,
    policy: &InterpretPolicy,
) -> Result<Prediction, DetectError> {
    // Stage 3: normalize
    let normalized = normalizer.transform(&raw)?;
    log::debug!(
        "{} normalization: {:?} -> {:?}",
        normalizer.name(),
        raw.as_array(),
        normalized.as_array()
    );

    // Stage 4: classify
    let raw_score = classifier.run(&normalized)?;
    log::debug!("classifier score: {raw_score}");

    // Stage 5: interpret
    let verdict = interpret(raw_score, policy)?;

    Ok(Prediction {
        verdict,
        raw,
        normalized,
        normalizer: normalizer.name(),
    })
}

/// Score one request and keep the intermediate vectors
pub fn predict_detailed(
    raw: &RawInputs,
    normalizer: &dyn Normalizer,
    classifier: &mut dyn Classifier,
    policy: &InterpretPolicy,
) -> Result<Prediction, DetectError> {
    let features = parse_inputs(raw)?;
    score(features, normalizer, classifier, policy)
}

/// Score one request.
///
/// Malformed input is rejected before the classifier is invoked; the classifier
/// is invoked exactly once otherwise.
///
/// # Example
/// ```ignore
/// let verdict = predict(&raw, &StandardScaler::default(), &mut handle, &InterpretPolicy::default())?;
/// ```
pub fn predict(
    raw: &RawInputs,
    normalizer: &dyn Normalizer,
    classifier: &mut dyn Classifier,
    policy: &InterpretPolicy,
) -> Result<Verdict, DetectError> {
    predict_detailed(raw, normalizer, classifier, policy).map(|p| p.verdict)
}

/// Stateful detector owning the normalizer, the classifier handle and the policy.
///
/// Requests are served sequentially; the classifier is released when the
/// detector is dropped or [`FraudDetector::release`] is called.
pub struct FraudDetector {
    normalizer: Box<dyn Normalizer>,
    classifier: ClassifierHandle,
    policy: InterpretPolicy,
}

impl FraudDetector {
    /// Create a detector from a configuration and an acquired classifier
    pub fn new(config: &DetectorConfig, classifier: ClassifierHandle) -> Result<Self, DetectError> {
        config.interpret.validate()?;
        let normalizer = config.normalizer.build()?;
        log::info!(
            "detector ready: normalizer={}, runtime={}, threshold={}",
            normalizer.name(),
            classifier.runtime_name(),
            config.interpret.threshold
        );

        Ok(Self {
            normalizer,
            classifier,
            policy: config.interpret,
        })
    }

    /// Map the model at `model_path`, build runtime `R` and create a detector
    pub fn open<R: ModelRuntime + 'static>(
        config: &DetectorConfig,
        model_path: impl AsRef<Path>,
    ) -> Result<Self, DetectError> {
        let classifier = ClassifierHandle::open::<R>(model_path)?;
        Self::new(config, classifier)
    }

    /// Create a detector around an in-process classifier
    pub fn with_classifier<C: Classifier + 'static>(
        config: &DetectorConfig,
        classifier: C,
    ) -> Result<Self, DetectError> {
        Self::new(config, ClassifierHandle::from_classifier(classifier))
    }

    /// Score raw caller text
    pub fn predict(&mut self, raw: &RawInputs) -> Result<Prediction, DetectError> {
        predict_detailed(raw, self.normalizer.as_ref(), &mut self.classifier, &self.policy)
    }

    /// Score numeric values that did not come from text
    pub fn predict_values(
        &mut self,
        values: [f32; FEATURE_COUNT],
    ) -> Result<Prediction, DetectError> {
        let features = check_finite(values)?;
        score(
            features,
            self.normalizer.as_ref(),
            &mut self.classifier,
            &self.policy,
        )
    }

    /// Normalize values without running the classifier
    pub fn normalize(&self, values: [f32; FEATURE_COUNT]) -> Result<FeatureVector, DetectError> {
        let features = check_finite(values)?;
        self.normalizer.transform(&features)
    }

    pub fn normalizer_name(&self) -> &'static str {
        self.normalizer.name()
    }

    pub fn policy(&self) -> &InterpretPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &ClassifierHandle {
        &self.classifier
    }

    /// Release the classifier; see [`ClassifierHandle::release`]
    pub fn release(&mut self) -> bool {
        self.classifier.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::ConfidencePolicy;
    use crate::normalizer::{StandardScaler, UnitScaler};
    use crate::types::Label;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Returns a fixed score and records every input it sees
    struct StubClassifier {
        score: f32,
        calls: Rc<Cell<usize>>,
        seen: Rc<RefCell<Vec<FeatureVector>>>,
    }

    impl StubClassifier {
        fn new(score: f32) -> Self {
            Self {
                score,
                calls: Rc::new(Cell::new(0)),
                seen: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Classifier for StubClassifier {
        fn run(&mut self, input: &FeatureVector) -> Result<f32, DetectError> {
            self.calls.set(self.calls.get() + 1);
            self.seen.borrow_mut().push(*input);
            Ok(self.score)
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn run(&mut self, _input: &FeatureVector) -> Result<f32, DetectError> {
            Err(DetectError::Inference("interpreter not initialized".to_string()))
        }
    }

    fn sample_inputs() -> RawInputs {
        RawInputs::new("45.0", "320.0", "0.55", "35.0")
    }

    fn approx(a: f32, b: f32, tolerance: f32) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_end_to_end_normal() {
        let mut stub = StubClassifier::new(0.2);
        let seen = Rc::clone(&stub.seen);

        let prediction = predict_detailed(
            &sample_inputs(),
            &StandardScaler::default(),
            &mut stub,
            &InterpretPolicy::default(),
        )
        .unwrap();

        let expected = [-0.070, -0.027, -0.052, 0.026];
        let fed = seen.borrow()[0];
        for (got, want) in fed.as_array().iter().zip(expected.iter()) {
            assert!(approx(*got, *want, 1e-3), "got {got}, want {want}");
        }
        assert_eq!(prediction.normalized, fed);
        assert_eq!(prediction.raw, FeatureVector::new([45.0, 320.0, 0.55, 35.0]));

        assert_eq!(prediction.verdict.label, Label::Normal);
        assert_eq!(prediction.verdict.raw_score, 0.2);
        assert!(approx(prediction.verdict.confidence, 80.0, 1e-4));
    }

    #[test]
    fn test_end_to_end_normal_margin_distance() {
        let mut stub = StubClassifier::new(0.2);
        let verdict = predict(
            &sample_inputs(),
            &StandardScaler::default(),
            &mut stub,
            &InterpretPolicy::with_confidence(ConfidencePolicy::MarginDistance),
        )
        .unwrap();

        assert_eq!(verdict.label, Label::Normal);
        assert!(approx(verdict.confidence, 60.0, 1e-4));
    }

    #[test]
    fn test_end_to_end_fraud() {
        let mut stub = StubClassifier::new(0.9);
        let verdict = predict(
            &sample_inputs(),
            &StandardScaler::default(),
            &mut stub,
            &InterpretPolicy::default(),
        )
        .unwrap();

        assert_eq!(verdict.label, Label::Fraud);
        assert!(approx(verdict.confidence, 90.0, 1e-4));
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_missing_field_names_first_blank() {
        let mut stub = StubClassifier::new(0.9);
        let calls = Rc::clone(&stub.calls);

        let err = predict(
            &RawInputs::new("", "1", "2", "3"),
            &StandardScaler::default(),
            &mut stub,
            &InterpretPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DetectError::MissingField {
                field: "typing_speed"
            }
        ));

        let err = predict(
            &RawInputs::new("1", "2", "   \t", ""),
            &StandardScaler::default(),
            &mut stub,
            &InterpretPolicy::default(),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("tap_pressure"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_presence_checked_before_parse() {
        let err = parse_inputs(&RawInputs::new("x", "1", "", "3")).unwrap_err();
        assert!(matches!(
            err,
            DetectError::MissingField {
                field: "swipe_speed"
            }
        ));
    }

    #[test]
    fn test_invalid_number_never_reaches_classifier() {
        let mut stub = StubClassifier::new(0.9);
        let calls = Rc::clone(&stub.calls);

        let err = predict(
            &RawInputs::new("x", "1", "2", "3"),
            &StandardScaler::default(),
            &mut stub,
            &InterpretPolicy::default(),
        )
        .unwrap_err();

        match err {
            DetectError::InvalidNumber { field, value } => {
                assert_eq!(field, "typing_speed");
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_non_finite_text_is_invalid() {
        for text in ["NaN", "inf", "-infinity", "1e40"] {
            let err = parse_inputs(&RawInputs::new("1", "2", "3", text)).unwrap_err();
            assert_eq!(err.kind(), "invalid_number", "{text} accepted");
            assert_eq!(err.field(), Some("device_angle"));
        }
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let features = parse_inputs(&RawInputs::new(" 45.0 ", "\t320", "0.55\n", "35")).unwrap();
        assert_eq!(features, FeatureVector::new([45.0, 320.0, 0.55, 35.0]));
    }

    #[test]
    fn test_classifier_failure_is_reported() {
        let err = predict(
            &sample_inputs(),
            &StandardScaler::default(),
            &mut FailingClassifier,
            &InterpretPolicy::default(),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Inference error: interpreter not initialized"
        );
    }

    #[test]
    fn test_unit_scaling_variant() {
        let mut stub = StubClassifier::new(0.7);
        let seen = Rc::clone(&stub.seen);

        predict(
            &RawInputs::new("500", "250", "0.4", "180"),
            &UnitScaler::default(),
            &mut stub,
            &InterpretPolicy::default(),
        )
        .unwrap();

        assert_eq!(seen.borrow()[0].as_array(), &[0.5, 0.25, 0.4, 0.5]);
    }

    #[test]
    fn test_detector_serves_repeated_requests() {
        let stub = StubClassifier::new(0.9);
        let calls = Rc::clone(&stub.calls);
        let mut detector = FraudDetector::with_classifier(&DetectorConfig::default(), stub).unwrap();

        assert!(detector.predict(&RawInputs::new("", "1", "2", "3")).is_err());
        let first = detector.predict(&sample_inputs()).unwrap();
        let second = detector.predict_values([45.0, 320.0, 0.55, 35.0]).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.normalizer, "standard");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_detector_predict_values_rejects_nan() {
        let stub = StubClassifier::new(0.9);
        let calls = Rc::clone(&stub.calls);
        let mut detector = FraudDetector::with_classifier(&DetectorConfig::default(), stub).unwrap();

        let err = detector
            .predict_values([1.0, f32::NAN, 0.5, 10.0])
            .unwrap_err();
        assert_eq!(err.field(), Some("swipe_speed"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_detector_after_release() {
        let mut detector =
            FraudDetector::with_classifier(&DetectorConfig::default(), StubClassifier::new(0.1))
                .unwrap();

        assert!(detector.release());
        assert!(!detector.release());
        assert!(matches!(
            detector.predict(&sample_inputs()),
            Err(DetectError::Inference(_))
        ));

        // Normalization does not need the classifier
        assert!(detector.normalize([45.0, 320.0, 0.55, 35.0]).is_ok());
    }
}
