//! Error types for the censoring pipeline.
//!
//! This module defines the error taxonomy used across the pipeline: invalid
//! caller input, configuration problems, model/decoder mismatches, and
//! opaque inference failures, plus conversions for the ambient image,
//! tensor, session, and IO error sources. No error is retried anywhere in
//! this crate; every error aborts the current batch call entirely, and
//! retry policy, if any, belongs to the host.

use thiserror::Error;

/// Enum representing the errors that can occur in the censoring pipeline.
#[derive(Error, Debug)]
pub enum CensorError {
    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// Opaque failure from the inference provider, propagated unchanged.
    #[error("inference")]
    Inference(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Error indicating invalid caller input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Model output incompatible with the decoder's layout assumptions.
    ///
    /// This is a fatal configuration error indicating the wrong model file
    /// was loaded for this pipeline.
    #[error("model mismatch: {message}")]
    ModelMismatch {
        /// A message describing the shape or layout mismatch.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Utility constructors for creating errors with context.
impl CensorError {
    /// Creates a CensorError for invalid caller input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a CensorError for a configuration problem.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a CensorError for a model output layout mismatch.
    pub fn model_mismatch(message: impl Into<String>) -> Self {
        Self::ModelMismatch {
            message: message.into(),
        }
    }

    /// Creates a CensorError wrapping an opaque inference provider failure.
    pub fn inference(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Inference(Box::new(error))
    }
}

/// Convenient result alias for censoring operations.
pub type CensorResult<T> = Result<T, CensorError>;
