//! FFI bindings for Nirbhay
//!
//! This module provides C-compatible functions for calling the detector from a
//! mobile host. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `nirbhay_free_string`.
//!
//! A host that already owns an inference engine (for example a TFLite
//! interpreter) creates a detector with `nirbhay_detector_new_with_callback` and
//! keeps validation, normalization and interpretation on the Rust side.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::ptr;

use crate::classifier::Classifier;
use crate::config::DetectorConfig;
use crate::encoder::VerdictEncoder;
use crate::error::DetectError;
use crate::pipeline::{check_finite, FraudDetector};
use crate::types::{FeatureVector, RawInputs, FEATURE_COUNT};

// Thread-local storage for the last error message and its machine code
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
    static LAST_ERROR_KIND: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(kind: &str, msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
    LAST_ERROR_KIND.with(|e| {
        *e.borrow_mut() = CString::new(kind).ok();
    });
}

fn set_detect_error(err: &DetectError) {
    set_last_error(err.kind(), &err.to_string());
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
    LAST_ERROR_KIND.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Parse an optional configuration pointer; NULL selects the defaults
unsafe fn config_arg(config_json: *const c_char) -> Result<DetectorConfig, DetectError> {
    if config_json.is_null() {
        return Ok(DetectorConfig::default());
    }
    let json = cstr_to_string(config_json)
        .ok_or_else(|| DetectError::Config("configuration is not valid UTF-8".to_string()))?;
    DetectorConfig::from_json(&json)
}

/// Read an input field; NULL is treated as a blank field.
///
/// Invalid UTF-8 is replaced rather than rejected so that the presence check
/// still sees every field before any value is parsed.
unsafe fn field_arg(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

// ============================================================================
// Host Classifier
// ============================================================================

/// Host inference callback.
///
/// Receives `len` normalized features, writes one score to `out_score` and
/// returns 0 on success. Any other return value is reported as an inference
/// error.
pub type NirbhayClassifyFn = unsafe extern "C" fn(
    input: *const f32,
    len: usize,
    out_score: *mut f32,
    user_data: *mut c_void,
) -> i32;

struct CallbackClassifier {
    callback: NirbhayClassifyFn,
    user_data: *mut c_void,
}

impl Classifier for CallbackClassifier {
    fn run(&mut self, input: &FeatureVector) -> Result<f32, DetectError> {
        let mut score = f32::NAN;
        // SAFETY: the host guarantees the callback and user_data stay valid until the detector is freed.
        let status = unsafe {
            (self.callback)(
                input.as_slice().as_ptr(),
                FEATURE_COUNT,
                &mut score,
                self.user_data,
            )
        };
        if status != 0 {
            return Err(DetectError::Inference(format!(
                "host classifier returned status {status}"
            )));
        }
        Ok(score)
    }
}

// ============================================================================
// Detector API
// ============================================================================

/// Opaque handle to a FraudDetector
pub struct NirbhayDetectorHandle {
    detector: FraudDetector,
    encoder: VerdictEncoder,
}

impl NirbhayDetectorHandle {
    fn new(detector: FraudDetector) -> *mut NirbhayDetectorHandle {
        Box::into_raw(Box::new(NirbhayDetectorHandle {
            detector,
            encoder: VerdictEncoder::new(),
        }))
    }
}

/// Create a detector whose classifier is a host callback.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - `callback` and `user_data` must remain valid until `nirbhay_detector_free`.
/// - Must be freed with `nirbhay_detector_free`.
/// - Returns NULL on error; call `nirbhay_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_detector_new_with_callback(
    config_json: *const c_char,
    callback: Option<NirbhayClassifyFn>,
    user_data: *mut c_void,
) -> *mut NirbhayDetectorHandle {
    clear_last_error();

    let callback = match callback {
        Some(cb) => cb,
        None => {
            set_last_error("config_error", "Null classifier callback");
            return ptr::null_mut();
        }
    };

    let config = match config_arg(config_json) {
        Ok(config) => config,
        Err(e) => {
            set_detect_error(&e);
            return ptr::null_mut();
        }
    };

    let classifier = CallbackClassifier {
        callback,
        user_data,
    };

    match FraudDetector::with_classifier(&config, classifier) {
        Ok(detector) => NirbhayDetectorHandle::new(detector),
        Err(e) => {
            set_detect_error(&e);
            ptr::null_mut()
        }
    }
}

/// Create a detector backed by an ONNX model file.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - `model_path` must be a valid null-terminated C string.
/// - Must be freed with `nirbhay_detector_free`.
/// - Returns NULL on error; call `nirbhay_last_error` to get the error message.
#[cfg(feature = "onnx")]
#[no_mangle]
pub unsafe extern "C" fn nirbhay_detector_open(
    config_json: *const c_char,
    model_path: *const c_char,
) -> *mut NirbhayDetectorHandle {
    clear_last_error();

    let path = match cstr_to_string(model_path) {
        Some(s) => s,
        None => {
            set_last_error("model_load_error", "Invalid model path pointer");
            return ptr::null_mut();
        }
    };

    let config = match config_arg(config_json) {
        Ok(config) => config,
        Err(e) => {
            set_detect_error(&e);
            return ptr::null_mut();
        }
    };

    match FraudDetector::open::<crate::onnx::OnnxRuntime>(&config, path) {
        Ok(detector) => NirbhayDetectorHandle::new(detector),
        Err(e) => {
            set_detect_error(&e);
            ptr::null_mut()
        }
    }
}

/// Free a detector and release its classifier.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a `nirbhay_detector_*` constructor, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_detector_free(detector: *mut NirbhayDetectorHandle) {
    if !detector.is_null() {
        drop(Box::from_raw(detector));
    }
}

/// Score four raw text fields and return the verdict report JSON.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a `nirbhay_detector_*` constructor.
/// - Each field must be NULL (treated as blank) or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `nirbhay_free_string`.
/// - Returns NULL on error; call `nirbhay_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_detector_predict(
    detector: *mut NirbhayDetectorHandle,
    typing_speed: *const c_char,
    swipe_speed: *const c_char,
    tap_pressure: *const c_char,
    device_angle: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if detector.is_null() {
        set_last_error("config_error", "Null detector pointer");
        return ptr::null_mut();
    }

    let handle = &mut *detector;

    let raw = RawInputs::new(
        field_arg(typing_speed),
        field_arg(swipe_speed),
        field_arg(tap_pressure),
        field_arg(device_angle),
    );

    let result = handle
        .detector
        .predict(&raw)
        .and_then(|prediction| handle.encoder.encode_to_json(&prediction));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_detect_error(&e);
            ptr::null_mut()
        }
    }
}

/// Score four numeric values and return the verdict report JSON.
///
/// # Safety
/// - `detector` must be a valid pointer returned by a `nirbhay_detector_*` constructor.
/// - Returns a newly allocated string that must be freed with `nirbhay_free_string`.
/// - Returns NULL on error; call `nirbhay_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_detector_predict_values(
    detector: *mut NirbhayDetectorHandle,
    typing_speed: f32,
    swipe_speed: f32,
    tap_pressure: f32,
    device_angle: f32,
) -> *mut c_char {
    clear_last_error();

    if detector.is_null() {
        set_last_error("config_error", "Null detector pointer");
        return ptr::null_mut();
    }

    let handle = &mut *detector;

    let result = handle
        .detector
        .predict_values([typing_speed, swipe_speed, tap_pressure, device_angle])
        .and_then(|prediction| handle.encoder.encode_to_json(&prediction));

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_detect_error(&e);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Normalize four values with the configured normalizer and return a JSON array.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `nirbhay_free_string`.
/// - Returns NULL on error; call `nirbhay_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_normalize(
    config_json: *const c_char,
    typing_speed: f32,
    swipe_speed: f32,
    tap_pressure: f32,
    device_angle: f32,
) -> *mut c_char {
    clear_last_error();

    let result = config_arg(config_json).and_then(|config| {
        let normalizer = config.normalizer.build()?;
        let raw = check_finite([typing_speed, swipe_speed, tap_pressure, device_angle])?;
        let normalized = normalizer.transform(&raw)?;
        serde_json::to_string(&normalized).map_err(DetectError::JsonError)
    });

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_detect_error(&e);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Nirbhay functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Nirbhay function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Nirbhay function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the machine code of the last error (`missing_field`, `invalid_number`, ...).
///
/// # Safety
/// - Same lifetime rules as `nirbhay_last_error`. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_last_error_kind() -> *const c_char {
    LAST_ERROR_KIND.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn nirbhay_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
