//! # CensorNet
//!
//! A Rust library that detects and censors regions of nudity in images using
//! ONNX object-detection models.
//!
//! ## Features
//!
//! - Complete detection-to-censorship pipeline from image batch to censored batch
//! - Letterbox preprocessing with invertible coordinate mapping
//! - Confidence thresholding and non-max suppression over raw model output
//! - Per-label censorship filtering over the fixed 16-class body-region table
//! - Pixelation, box blur, Gaussian blur, and image-overlay censor methods
//! - Area-adaptive block-count scaling for pixelation granularity
//! - ONNX Runtime integration for fast inference
//!
//! ## Components
//!
//! - **Letterbox Transform**: Fit images into the model's square input while
//!   recording the parameters needed to map detections back
//! - **Detection Decoder**: Convert raw model output into deduplicated,
//!   labeled bounding boxes
//! - **Label Filter**: Decide which detected classes are censored vs. ignored
//! - **Masking Engine**: Mutate detected regions with the configured censor method
//! - **Pipeline Orchestrator**: Sequence the above over a batch of images
//!
//! ## Modules
//!
//! * [`core`] - Error handling, tensor aliases, configuration, and ONNX inference
//! * [`labels`] - The body-region label table and censorship filter
//! * [`pipeline`] - Batch orchestrator and the host-facing operation registry
//! * [`processors`] - Letterbox, detection decoding, and masking
//! * [`utils`] - Image loading and the pixelation/compositing primitives
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use censornet::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load the detection model from the configured model directory
//! let models = ModelDir::new("models");
//! let model = models.load("320n.onnx")?;
//!
//! // Censor everything the model detects, pixelating with a 3x3 grid
//! let censor = NudityCensor::new(model, CensorConfig::default(), LabelFilter::none())?;
//!
//! let image = load_image(std::path::Path::new("photo.jpg"))?;
//! let censored = censor.censor(vec![image])?;
//! # let _ = censored;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod labels;
pub mod pipeline;
pub mod processors;
pub mod utils;

pub use utils::init_tracing;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use censornet::prelude::*;
/// ```
///
/// Included items focus on the most common tasks:
/// - Pipeline entry points (`NudityCensor`, `CensorConfig`, `CensorMethod`,
///   `BlockCountScaling`)
/// - Label filtering (`Label`, `LabelFilter`)
/// - Model loading (`ModelDir`, `DetectionModel`)
/// - Essential error and result types (`CensorError`, `CensorResult`)
/// - Basic image loading (`load_image`)
pub mod prelude {
    pub use crate::core::config::{BlockCountScaling, CensorConfig, CensorMethod, OverlaySource};
    pub use crate::core::inference::{DetectionModel, ModelDir};
    pub use crate::core::{CensorError, CensorResult};
    pub use crate::labels::{Label, LabelFilter};
    pub use crate::pipeline::NudityCensor;
    pub use crate::utils::load_image;
}
