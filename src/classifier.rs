//! Classifier capability and model handle
//!
//! The neural network is opaque to this crate: anything that maps a normalized
//! [`FeatureVector`] to one score implements [`Classifier`]. A [`ClassifierHandle`]
//! owns the memory-mapped model asset together with the runtime built from it and
//! releases both exactly once.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::DetectError;
use crate::types::FeatureVector;

/// Single-score inference over a normalized feature vector
pub trait Classifier {
    /// Run the model once. Any runtime failure is reported as [`DetectError::Inference`].
    fn run(&mut self, input: &FeatureVector) -> Result<f32, DetectError>;
}

impl<F> Classifier for F
where
    F: FnMut(&FeatureVector) -> Result<f32, DetectError>,
{
    fn run(&mut self, input: &FeatureVector) -> Result<f32, DetectError> {
        self(input)
    }
}

/// Inference engine that can be built from serialized model bytes
pub trait ModelRuntime: Classifier + Sized {
    /// Engine name for logs
    const NAME: &'static str;

    /// Build the engine from the model asset contents
    fn load(model: &[u8]) -> Result<Self, DetectError>;
}

/// Read-only memory map of a model file
pub struct ModelAsset {
    path: PathBuf,
    map: Mmap,
}

impl ModelAsset {
    /// Map the model file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DetectError::ModelLoad(format!("cannot open {}: {e}", path.display())))?;

        let len = file
            .metadata()
            .map_err(|e| DetectError::ModelLoad(format!("cannot stat {}: {e}", path.display())))?
            .len();
        if len == 0 {
            return Err(DetectError::ModelLoad(format!(
                "model asset {} is empty",
                path.display()
            )));
        }

        // SAFETY: the map is read-only and the asset is never modified while the handle lives.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| DetectError::ModelLoad(format!("cannot map {}: {e}", path.display())))?;

        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Owned classifier plus the model asset it was loaded from
pub struct ClassifierHandle {
    runtime: Option<Box<dyn Classifier>>,
    asset: Option<ModelAsset>,
    runtime_name: &'static str,
}

impl ClassifierHandle {
    /// Map the model at `path` and build runtime `R` from it.
    ///
    /// If the runtime cannot be built, the mapping is released before the error
    /// is returned.
    pub fn open<R: ModelRuntime + 'static>(path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let asset = ModelAsset::open(path)?;
        log::info!(
            "mapped model asset {} ({} bytes)",
            asset.path().display(),
            asset.len()
        );

        let runtime = match R::load(asset.as_bytes()) {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!(
                    "{} runtime failed to load {}: {e}",
                    R::NAME,
                    asset.path().display()
                );
                drop(asset);
                return Err(e);
            }
        };
        log::info!("{} runtime ready", R::NAME);

        Ok(Self {
            runtime: Some(Box::new(runtime)),
            asset: Some(asset),
            runtime_name: R::NAME,
        })
    }

    /// Wrap an in-process classifier that has no model asset
    pub fn from_classifier<C: Classifier + 'static>(classifier: C) -> Self {
        Self {
            runtime: Some(Box::new(classifier)),
            asset: None,
            runtime_name: "in-process",
        }
    }

    pub fn runtime_name(&self) -> &'static str {
        self.runtime_name
    }

    pub fn asset(&self) -> Option<&ModelAsset> {
        self.asset.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.runtime.is_none() && self.asset.is_none()
    }

    /// Release the runtime and then the asset.
    ///
    /// Returns `true` only for the call that actually released something; later
    /// calls (including the one from `Drop`) are no-ops.
    pub fn release(&mut self) -> bool {
        if self.is_released() {
            return false;
        }
        drop(self.runtime.take());
        drop(self.asset.take());
        log::info!("{} classifier released", self.runtime_name);
        true
    }
}

impl Classifier for ClassifierHandle {
    fn run(&mut self, input: &FeatureVector) -> Result<f32, DetectError> {
        match self.runtime.as_mut() {
            Some(runtime) => runtime.run(input),
            None => Err(DetectError::Inference(
                "classifier handle has been released".to_string(),
            )),
        }
    }
}

impl Drop for ClassifierHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle")
            .field("runtime", &self.runtime_name)
            .field("asset", &self.asset.as_ref().map(|a| a.path().to_path_buf()))
            .field("released", &self.is_released())
            .finish()
    }
}
