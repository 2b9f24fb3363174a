//! Letterbox preprocessing for detection inference.
//!
//! The detection model consumes a fixed square input. Arbitrary-aspect
//! images are resized to fit while preserving aspect ratio, then padded
//! with a constant black border to the full square. The transform records
//! the parameters needed to map detections back to original-image
//! coordinates: the diagonal-ratio resize factor and the top/left padding.
//!
//! The resize factor is a single scalar derived from the diagonal ratio
//! between the original and the resized (pre-pad) image, not a pair of
//! per-axis scales. It is exact whenever rounding preserves the aspect
//! ratio, which the new-size computation arranges for; the residual
//! rounding error is accepted to keep decoded coordinates identical to the
//! reference behavior.

use image::RgbImage;
use image::imageops::FilterType;

use crate::core::Tensor4D;
use crate::core::errors::{CensorError, CensorResult};

/// A letterboxed image together with the coordinate-inversion parameters.
///
/// Created once per image, consumed by the tensor conversion and the
/// detection decoder, then discarded.
#[derive(Debug, Clone)]
pub struct LetterboxImage {
    /// The resized and padded square image.
    pub image: RgbImage,
    /// Ratio between the original and resized (pre-pad) image diagonals.
    pub resize_factor: f32,
    /// Black border width on the left edge, in pixels.
    pub pad_left: u32,
    /// Black border height on the top edge, in pixels.
    pub pad_top: u32,
}

/// Resizes images into a fixed square canvas while preserving aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    target_size: u32,
}

impl Letterbox {
    /// Creates a letterbox transform targeting a `target_size` square.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `target_size` is zero.
    pub fn new(target_size: u32) -> CensorResult<Self> {
        if target_size == 0 {
            return Err(CensorError::invalid_input(
                "letterbox target size must be positive",
            ));
        }
        Ok(Self { target_size })
    }

    /// The square side length images are letterboxed into.
    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Letterboxes one image.
    ///
    /// The shorter-relative dimension is scaled to `target_size` and the
    /// other dimension follows the aspect ratio; the remainder is padded
    /// with black, split so the top/left border takes the smaller share
    /// when the padding is odd.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if either image dimension is zero.
    pub fn apply(&self, image: &RgbImage) -> CensorResult<LetterboxImage> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CensorError::invalid_input(format!(
                "cannot letterbox a {width}x{height} image"
            )));
        }

        let target = self.target_size;
        let aspect = width as f64 / height as f64;
        let (new_width, new_height) = if height > width {
            let new_width = (target as f64 * aspect).round() as u32;
            (new_width.max(1), target)
        } else {
            let new_height = (target as f64 / aspect).round() as u32;
            (target, new_height.max(1))
        };

        let resize_factor = (((width as f64).powi(2) + (height as f64).powi(2))
            / ((new_width as f64).powi(2) + (new_height as f64).powi(2)))
        .sqrt() as f32;

        let resized = image::imageops::resize(image, new_width, new_height, FilterType::Lanczos3);

        let pad_x = target - new_width.min(target);
        let pad_y = target - new_height.min(target);
        let pad_left = pad_x / 2;
        let pad_top = pad_y / 2;

        // Compositing onto a target-sized black canvas also pins the output
        // to exactly target x target regardless of rounding.
        let mut canvas = RgbImage::new(target, target);
        image::imageops::overlay(&mut canvas, &resized, pad_left as i64, pad_top as i64);

        Ok(LetterboxImage {
            image: canvas,
            resize_factor,
            pad_left,
            pad_top,
        })
    }
}

/// Converts a letterboxed RGB image into the model's `[1, 3, S, S]` input
/// tensor, with channel values scaled to `[0, 1]`.
pub fn to_input_tensor(image: &RgbImage) -> Tensor4D {
    let (width, height) = image.dimensions();
    let mut tensor = Tensor4D::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] = pixel.0[channel] as f32 / 255.0;
        }
    }
    tensor
}
