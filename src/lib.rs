//! Nirbhay - On-device behavioral-biometric fraud check
//!
//! Nirbhay scores four behavioral measurements (typing speed, swipe speed, tap
//! pressure, device tilt) through a deterministic pipeline: input validation →
//! normalization → opaque classifier → verdict interpretation.
//!
//! ## Modules
//!
//! - **Normalizer**: z-score standardization or fixed unit scaling
//! - **Classifier**: model handle owning the mapped asset and inference runtime
//! - **Pipeline**: request orchestration and the stateful [`FraudDetector`]

pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod interpret;
pub mod normalizer;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use classifier::{Classifier, ClassifierHandle, ModelAsset, ModelRuntime};
pub use config::{DetectorConfig, NormalizerConfig};
pub use error::DetectError;
pub use interpret::{interpret, ConfidencePolicy, InterpretPolicy};
pub use normalizer::{standardize, Normalizer, ScalerParameters, StandardScaler, UnitScaler};
pub use pipeline::{predict, predict_detailed, FraudDetector};
pub use types::{Feature, FeatureVector, Label, Prediction, RawInputs, Verdict, FEATURE_COUNT};

#[cfg(feature = "onnx")]
pub use onnx::OnnxRuntime;

/// Library version embedded in all verdict reports
pub const NIRBHAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for verdict reports
pub const PRODUCER_NAME: &str = "nirbhay-core";

/// Conventional file name of the bundled model asset
pub const DEFAULT_MODEL_ASSET: &str = "nn_model.onnx";
