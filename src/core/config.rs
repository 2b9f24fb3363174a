//! Censor configuration types.
//!
//! This module defines the options that control one pipeline invocation:
//! the censor method, the confidence threshold, the pixelation block count,
//! and the area-adaptive block-count scaling policy. Configuration is
//! immutable for the duration of a pipeline pass.

use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::core::errors::CensorError;
use crate::utils::image::AlphaMask;

/// Default confidence threshold for keeping a detection.
pub const DEFAULT_MIN_SCORE: f32 = 0.2;

/// Default pixelation block count.
pub const DEFAULT_BLOCKS: u32 = 3;

/// Maximum accepted pixelation block count.
pub const MAX_BLOCKS: u32 = 100;

/// Default overlay compositing strength.
pub const DEFAULT_OVERLAY_STRENGTH: f32 = 1.0;

/// Maximum accepted overlay compositing strength.
pub const MAX_OVERLAY_STRENGTH: f32 = 10.0;

/// The masking transform applied to each detected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CensorMethod {
    /// Replace the region with a coarse grid of uniform-colored blocks.
    Pixelate,
    /// Box-blur the region with a block-count-sized window.
    Blur,
    /// Gaussian-blur the region with a kernel tied to the box height.
    GaussianBlur,
    /// Alpha-composite a configured overlay image onto the region.
    Image,
}

impl CensorMethod {
    /// Returns the canonical lowercase name of this method.
    pub fn as_str(self) -> &'static str {
        match self {
            CensorMethod::Pixelate => "pixelate",
            CensorMethod::Blur => "blur",
            CensorMethod::GaussianBlur => "gaussian_blur",
            CensorMethod::Image => "image",
        }
    }
}

impl FromStr for CensorMethod {
    type Err = CensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pixelate" => Ok(CensorMethod::Pixelate),
            "blur" => Ok(CensorMethod::Blur),
            "gaussian_blur" => Ok(CensorMethod::GaussianBlur),
            "image" => Ok(CensorMethod::Image),
            _ => Err(CensorError::config_error(format!(
                "unknown censor method: '{s}'"
            ))),
        }
    }
}

/// Policy that varies pixelation/blur granularity with detection size.
///
/// The detection's size fraction `d_pct` is the larger of its clipped
/// height/image-height and width/image-width ratios, so `d_pct` is always
/// within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCountScaling {
    /// Use the configured block count unchanged for every detection.
    Fixed,
    /// Small detections get fewer blocks (near 1); large detections
    /// approach the configured block count.
    FewerWhenSmall,
    /// Large detections get fewer blocks (coarser censoring, toward 1);
    /// small detections keep the configured block count.
    FewerWhenLarge,
}

impl BlockCountScaling {
    /// Returns the canonical lowercase name of this policy.
    pub fn as_str(self) -> &'static str {
        match self {
            BlockCountScaling::Fixed => "fixed",
            BlockCountScaling::FewerWhenSmall => "fewer_when_small",
            BlockCountScaling::FewerWhenLarge => "fewer_when_large",
        }
    }
}

impl FromStr for BlockCountScaling {
    type Err = CensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(BlockCountScaling::Fixed),
            "fewer_when_small" => Ok(BlockCountScaling::FewerWhenSmall),
            "fewer_when_large" => Ok(BlockCountScaling::FewerWhenLarge),
            _ => Err(CensorError::config_error(format!(
                "unknown block count scaling: '{s}'"
            ))),
        }
    }
}

/// Overlay inputs for [`CensorMethod::Image`].
#[derive(Debug, Clone)]
pub struct OverlaySource {
    /// The image composited over each detected region.
    pub image: RgbImage,
    /// Per-pixel compositing weights in `[0, 1]`, same aspect as `image`.
    pub alpha: AlphaMask,
    /// Scalar multiplier on the alpha mask; the effective weight is
    /// clamped to `[0, 1]` at composite time.
    pub strength: f32,
}

impl OverlaySource {
    /// Creates an overlay source with the default compositing strength.
    pub fn new(image: RgbImage, alpha: AlphaMask) -> Self {
        Self {
            image,
            alpha,
            strength: DEFAULT_OVERLAY_STRENGTH,
        }
    }

    /// Sets the compositing strength.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }
}

/// Configuration for one censoring pipeline invocation.
#[derive(Debug, Clone)]
pub struct CensorConfig {
    /// The masking transform applied to detected regions.
    pub method: CensorMethod,
    /// Minimum confidence for keeping a detection, in `[0, 1]`.
    pub min_score: f32,
    /// Pixelation/blur block count, in `1..=100`.
    pub blocks: u32,
    /// Area-adaptive block-count policy.
    pub block_count_scaling: BlockCountScaling,
    /// Overlay inputs; required iff `method == CensorMethod::Image`.
    pub overlay: Option<OverlaySource>,
}

impl Default for CensorConfig {
    fn default() -> Self {
        Self {
            method: CensorMethod::Pixelate,
            min_score: DEFAULT_MIN_SCORE,
            blocks: DEFAULT_BLOCKS,
            block_count_scaling: BlockCountScaling::Fixed,
            overlay: None,
        }
    }
}

impl CensorConfig {
    /// Creates a configuration for the given method with default settings.
    pub fn new(method: CensorMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Sets the minimum confidence threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Sets the block count.
    pub fn with_blocks(mut self, blocks: u32) -> Self {
        self.blocks = blocks;
        self
    }

    /// Sets the block-count scaling policy.
    pub fn with_block_count_scaling(mut self, scaling: BlockCountScaling) -> Self {
        self.block_count_scaling = scaling;
        self
    }

    /// Sets the overlay source used by [`CensorMethod::Image`].
    pub fn with_overlay(mut self, overlay: OverlaySource) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * `min_score` is outside `[0, 1]` or not finite
    /// * `blocks` is outside `1..=100`
    /// * the method is `Image` and no overlay source is configured
    /// * an overlay strength is outside `[0, 10]` or not finite
    pub fn validate(&self) -> Result<(), CensorError> {
        if !self.min_score.is_finite() || !(0.0..=1.0).contains(&self.min_score) {
            return Err(CensorError::config_error(format!(
                "min_score must be within [0.0, 1.0], got {}",
                self.min_score
            )));
        }

        if self.blocks < 1 || self.blocks > MAX_BLOCKS {
            return Err(CensorError::config_error(format!(
                "blocks must be within 1..={MAX_BLOCKS}, got {}",
                self.blocks
            )));
        }

        if self.method == CensorMethod::Image {
            let overlay = self.overlay.as_ref().ok_or_else(|| {
                CensorError::config_error(
                    "censor method 'image' requires an overlay image and alpha mask",
                )
            })?;
            if !overlay.strength.is_finite()
                || !(0.0..=MAX_OVERLAY_STRENGTH).contains(&overlay.strength)
            {
                return Err(CensorError::config_error(format!(
                    "overlay strength must be within [0.0, {MAX_OVERLAY_STRENGTH}], got {}",
                    overlay.strength
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip() {
        for method in [
            CensorMethod::Pixelate,
            CensorMethod::Blur,
            CensorMethod::GaussianBlur,
            CensorMethod::Image,
        ] {
            assert_eq!(method.as_str().parse::<CensorMethod>().unwrap(), method);
        }
        assert!("mosaic".parse::<CensorMethod>().is_err());
    }

    #[test]
    fn scaling_names_round_trip() {
        for scaling in [
            BlockCountScaling::Fixed,
            BlockCountScaling::FewerWhenSmall,
            BlockCountScaling::FewerWhenLarge,
        ] {
            assert_eq!(
                scaling.as_str().parse::<BlockCountScaling>().unwrap(),
                scaling
            );
        }
        assert!("adaptive".parse::<BlockCountScaling>().is_err());
    }

    #[test]
    fn serde_names_match_canonical_strings() {
        let method: CensorMethod = serde_json::from_str("\"gaussian_blur\"").unwrap();
        assert_eq!(method, CensorMethod::GaussianBlur);
        let scaling: BlockCountScaling = serde_json::from_str("\"fewer_when_large\"").unwrap();
        assert_eq!(scaling, BlockCountScaling::FewerWhenLarge);
        assert_eq!(
            serde_json::to_string(&CensorMethod::Pixelate).unwrap(),
            "\"pixelate\""
        );
    }

    #[test]
    fn default_config_validates() {
        CensorConfig::default().validate().unwrap();
    }

    #[test]
    fn image_method_requires_overlay() {
        let config = CensorConfig::new(CensorMethod::Image);
        assert!(matches!(
            config.validate(),
            Err(CensorError::ConfigError { .. })
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let config = CensorConfig::default().with_min_score(1.5);
        assert!(config.validate().is_err());

        let config = CensorConfig::default().with_blocks(0);
        assert!(config.validate().is_err());

        let config = CensorConfig::default().with_blocks(MAX_BLOCKS + 1);
        assert!(config.validate().is_err());
    }
}
