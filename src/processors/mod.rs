//! Image processing stages of the censoring pipeline.
//!
//! This module contains the three processing stages that surround the
//! inference call: letterbox preprocessing, detection decoding with
//! non-max suppression, and per-detection region masking.

pub mod letterbox;
pub mod mask;
pub mod postprocess;

pub use letterbox::{Letterbox, LetterboxImage, to_input_tensor};
pub use mask::{RegionMasker, scaled_block_count};
pub use postprocess::{BBox, Detection, DetectionDecoder};
