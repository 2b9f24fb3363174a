//! ONNX Runtime inference engine and model loading.
//!
//! The inference provider is opaque to the rest of the pipeline: it exposes
//! a single `run` capability through the [`RawInference`] trait plus the
//! static input metadata the preprocessing and decoding stages need. The
//! [`DetectionModel`] handle separates that capability from the metadata and
//! is read-only after construction, so it can be shared freely across
//! parallel per-image workers.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::{TensorRef, ValueType};
use tracing::debug;

use crate::core::errors::{CensorError, CensorResult};
use crate::core::{Tensor4D, TensorD};

/// The opaque inference capability: batched image tensor in, raw output out.
///
/// Implemented by [`OnnxSession`] for production use; tests substitute a
/// stub returning a crafted output tensor.
pub trait RawInference: Send + Sync + std::fmt::Debug {
    /// Runs the model on a `[1, 3, S, S]` input tensor and returns the raw
    /// output tensor unchanged.
    fn run(&self, input: &Tensor4D) -> CensorResult<TensorD>;
}

/// ONNX Runtime session pool.
///
/// Sessions are kept behind mutexes and handed out round-robin so that
/// parallel per-image workers serialize only on the inference call itself.
pub struct OnnxSession {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
}

impl std::fmt::Debug for OnnxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSession")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .finish()
    }
}

impl OnnxSession {
    /// Creates a session pool of `pool_size` sessions from a model file.
    ///
    /// # Errors
    ///
    /// Returns an error if the model file cannot be loaded, or if the model
    /// declares no inputs.
    pub fn new(model_path: impl AsRef<Path>, pool_size: usize) -> CensorResult<Self> {
        let path = model_path.as_ref();
        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let session = Session::builder()?
                .with_log_level(LogLevel::Error)?
                .commit_from_file(path)?;
            sessions.push(Mutex::new(session));
        }

        let input_name = {
            let session = sessions[0]
                .lock()
                .map_err(|_| CensorError::invalid_input("failed to acquire session lock"))?;
            session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or_else(|| {
                    CensorError::model_mismatch("model declares no inputs - invalid model file")
                })?
        };

        Ok(Self {
            sessions,
            next_idx: AtomicUsize::new(0),
            input_name,
        })
    }

    /// Returns the model's declared input tensor name.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Retrieves the primary input tensor shape from the first session.
    ///
    /// Dynamic dimensions (e.g., -1) are returned as-is.
    pub fn input_shape(&self) -> Option<Vec<i64>> {
        let session = self.sessions.first()?.lock().ok()?;
        let input = session.inputs.first()?;
        match &input.input_type {
            ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
            _ => None,
        }
    }
}

impl RawInference for OnnxSession {
    fn run(&self, input: &Tensor4D) -> CensorResult<TensorD> {
        let input_tensor = TensorRef::from_array_view(input.view())?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx]
            .lock()
            .map_err(|_| CensorError::invalid_input("failed to acquire session lock"))?;

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| {
                CensorError::model_mismatch("model declares no outputs - invalid model file")
            })?;

        let outputs = session.run(inputs)?;
        let (shape, data) = outputs[output_name.as_str()].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let raw = TensorD::from_shape_vec(ndarray::IxDyn(&dims), data.to_vec())?;
        Ok(raw)
    }
}

/// Handle for a loaded detection model.
///
/// Carries the `run` capability behind the [`RawInference`] seam and the
/// plain input metadata read from the model at load time. Loaded once,
/// reused across many pipeline invocations.
#[derive(Debug)]
pub struct DetectionModel {
    infer: Box<dyn RawInference>,
    input_width: u32,
    input_height: u32,
    input_name: String,
}

impl DetectionModel {
    /// Creates a model handle from an inference implementation and its
    /// static input metadata.
    pub fn new(
        infer: Box<dyn RawInference>,
        input_width: u32,
        input_height: u32,
        input_name: impl Into<String>,
    ) -> Self {
        Self {
            infer,
            input_width,
            input_height,
            input_name: input_name.into(),
        }
    }

    /// Runs inference on a preprocessed input tensor.
    pub fn run(&self, input: &Tensor4D) -> CensorResult<TensorD> {
        self.infer.run(input)
    }

    /// The model's expected input width in pixels.
    pub fn input_width(&self) -> u32 {
        self.input_width
    }

    /// The model's expected input height in pixels.
    pub fn input_height(&self) -> u32 {
        self.input_height
    }

    /// The model's declared input tensor name.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }
}

/// Resolves and loads detection models by file name from a model directory.
#[derive(Debug, Clone)]
pub struct ModelDir {
    root: PathBuf,
    pool_size: usize,
}

impl ModelDir {
    /// Creates a model directory rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pool_size: 1,
        }
    }

    /// Sets the ONNX session pool size used for loaded models.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    /// The directory models are resolved from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the `.onnx` model file names available in the directory.
    pub fn available_models(&self) -> CensorResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("onnx") {
                if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Loads a model by file name.
    ///
    /// The model's input is expected to be a static `[1, 3, H, W]` tensor;
    /// the width/height metadata is read from the session at load time.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file does not exist, and `ModelMismatch`
    /// if the model's declared input is not a static 4-D image tensor.
    pub fn load(&self, model_name: &str) -> CensorResult<std::sync::Arc<DetectionModel>> {
        let path = self.root.join(model_name);
        if !path.is_file() {
            return Err(CensorError::config_error(format!(
                "model '{}' not found in '{}'",
                model_name,
                self.root.display()
            )));
        }

        let session = OnnxSession::new(&path, self.pool_size)?;
        let shape = session.input_shape().ok_or_else(|| {
            CensorError::model_mismatch("model input is not a tensor - wrong model file")
        })?;
        if shape.len() != 4 {
            return Err(CensorError::model_mismatch(format!(
                "expected a [1, 3, H, W] model input, got shape {shape:?}"
            )));
        }
        let height = shape[2];
        let width = shape[3];
        if height <= 0 || width <= 0 {
            return Err(CensorError::model_mismatch(format!(
                "model input spatial dims must be static and positive, got shape {shape:?}"
            )));
        }

        let input_name = session.input_name().to_string();
        debug!(
            model = model_name,
            input = %input_name,
            width,
            height,
            "loaded detection model"
        );

        Ok(std::sync::Arc::new(DetectionModel::new(
            Box::new(session),
            width as u32,
            height as u32,
            input_name,
        )))
    }
}
