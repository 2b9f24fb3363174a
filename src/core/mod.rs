//! The core module of the censoring pipeline.
//!
//! This module contains the fundamental components of the pipeline, including:
//! - Error handling
//! - Tensor type aliases
//! - Censor configuration
//! - ONNX inference engine integration and model loading
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod config;
pub mod errors;
pub mod inference;

pub use config::{BlockCountScaling, CensorConfig, CensorMethod, OverlaySource};
pub use errors::{CensorError, CensorResult};
pub use inference::{DetectionModel, ModelDir, OnnxSession, RawInference};

/// A 4-dimensional f32 tensor in `[batch, channel, height, width]` layout.
pub type Tensor4D = ndarray::Array4<f32>;

/// A dynamically-shaped f32 tensor, as returned by the inference provider.
pub type TensorD = ndarray::ArrayD<f32>;
