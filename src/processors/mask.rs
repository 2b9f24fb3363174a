//! Per-detection region masking.
//!
//! Given a detection box and a censor configuration, the masking engine
//! mutates the corresponding image region in place. Detection boxes may
//! extend past the image edges, so every box is clipped first; a box with
//! nothing left after clipping is skipped rather than treated as an error.
//!
//! The block-count scaling policy varies pixelation/blur granularity with
//! the detected region's size relative to the image, using the clipped
//! region so the size fraction stays within `[0, 1]`.

use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::core::config::{BlockCountScaling, CensorConfig, CensorMethod};
use crate::core::errors::{CensorError, CensorResult};
use crate::processors::postprocess::Detection;
use crate::utils::image::{alpha_composite_at, box_blur, pixelate};

/// Effective block count for a detection occupying `d_pct` of the image.
///
/// `d_pct` is the larger of the clipped region's height/image-height and
/// width/image-width ratios. For `blocks >= 1` and `d_pct` in `[0, 1]` the
/// result stays within `[1, blocks]`: `FewerWhenLarge` interpolates from
/// `blocks` down to 1 as the region grows, `FewerWhenSmall` from 1 up to
/// `blocks`.
pub fn scaled_block_count(scaling: BlockCountScaling, blocks: u32, d_pct: f32) -> u32 {
    let b = blocks as f32;
    let scaled = match scaling {
        BlockCountScaling::Fixed => b,
        BlockCountScaling::FewerWhenLarge => (b + d_pct * (1.0 - b)).floor(),
        BlockCountScaling::FewerWhenSmall => (1.0 + d_pct * (b - 1.0)).floor(),
    };
    (scaled as u32).max(1)
}

/// Applies the configured censor method to detected regions of an image.
#[derive(Debug)]
pub struct RegionMasker<'a> {
    config: &'a CensorConfig,
}

impl<'a> RegionMasker<'a> {
    /// Creates a masker for one pipeline invocation's configuration.
    pub fn new(config: &'a CensorConfig) -> Self {
        Self { config }
    }

    /// Censors one detection's region in place.
    ///
    /// The box is clipped to the image bounds; zero-area boxes are a
    /// no-op. For the `Image` method the overlay compositing routine
    /// mutates the full image and clips against its bounds itself.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the method is `Image` and no overlay
    /// source is configured.
    pub fn apply(&self, image: &mut RgbImage, detection: &Detection) -> CensorResult<()> {
        let (img_w, img_h) = image.dimensions();
        let bbox = detection.bbox;

        let x0 = bbox.x.clamp(0, img_w as i32);
        let y0 = bbox.y.clamp(0, img_h as i32);
        let x1 = bbox.x.saturating_add(bbox.width).clamp(0, img_w as i32);
        let y1 = bbox.y.saturating_add(bbox.height).clamp(0, img_h as i32);

        let width = (x1 - x0).max(0) as u32;
        let height = (y1 - y0).max(0) as u32;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let (x0, y0) = (x0 as u32, y0 as u32);

        let d_pct = (height as f32 / img_h as f32).max(width as f32 / img_w as f32);
        let blocks = scaled_block_count(self.config.block_count_scaling, self.config.blocks, d_pct);

        match self.config.method {
            CensorMethod::Pixelate => {
                let region = imageops::crop_imm(image, x0, y0, width, height).to_image();
                let censored = pixelate(&region, blocks);
                imageops::replace(image, &censored, x0 as i64, y0 as i64);
            }
            CensorMethod::Blur => {
                let region = imageops::crop_imm(image, x0, y0, width, height).to_image();
                let censored = box_blur(&region, blocks);
                imageops::replace(image, &censored, x0 as i64, y0 as i64);
            }
            CensorMethod::GaussianBlur => {
                let region = imageops::crop_imm(image, x0, y0, width, height).to_image();
                let censored =
                    imageproc::filter::gaussian_blur_f32(&region, gaussian_sigma(height));
                imageops::replace(image, &censored, x0 as i64, y0 as i64);
            }
            CensorMethod::Image => {
                let overlay = self.config.overlay.as_ref().ok_or_else(|| {
                    CensorError::config_error(
                        "censor method 'image' requires an overlay image and alpha mask",
                    )
                })?;
                let resized =
                    imageops::resize(&overlay.image, width, height, FilterType::Triangle);
                let alpha = imageops::resize(&overlay.alpha, width, height, FilterType::Triangle);
                alpha_composite_at(
                    image,
                    &resized,
                    &alpha,
                    x0 as i32,
                    y0 as i32,
                    overlay.strength,
                );
            }
        }

        Ok(())
    }
}

/// OpenCV's automatic sigma for a Gaussian kernel of the given size.
fn gaussian_sigma(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::OverlaySource;
    use crate::processors::postprocess::BBox;
    use crate::utils::image::AlphaMask;
    use image::{Luma, Rgb};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        })
    }

    fn detection(x: i32, y: i32, width: i32, height: i32) -> Detection {
        Detection {
            class_id: 3,
            score: 0.9,
            bbox: BBox::new(x, y, width, height),
        }
    }

    #[test]
    fn fixed_scaling_ignores_region_size() {
        for d_pct in [0.0, 0.3, 1.0] {
            assert_eq!(scaled_block_count(BlockCountScaling::Fixed, 7, d_pct), 7);
        }
    }

    #[test]
    fn scaled_blocks_stay_within_one_and_blocks() {
        for blocks in [1u32, 2, 3, 10, 100] {
            for step in 0..=10 {
                let d_pct = step as f32 / 10.0;
                for scaling in [
                    BlockCountScaling::FewerWhenLarge,
                    BlockCountScaling::FewerWhenSmall,
                ] {
                    let scaled = scaled_block_count(scaling, blocks, d_pct);
                    assert!(
                        (1..=blocks).contains(&scaled),
                        "{scaling:?} blocks={blocks} d_pct={d_pct} -> {scaled}"
                    );
                }
            }
        }
    }

    #[test]
    fn fewer_when_large_shrinks_toward_one() {
        assert_eq!(
            scaled_block_count(BlockCountScaling::FewerWhenLarge, 10, 0.0),
            10
        );
        assert_eq!(
            scaled_block_count(BlockCountScaling::FewerWhenLarge, 10, 1.0),
            1
        );
        assert_eq!(
            scaled_block_count(BlockCountScaling::FewerWhenLarge, 10, 0.5),
            5
        );
    }

    #[test]
    fn fewer_when_small_grows_toward_blocks() {
        assert_eq!(
            scaled_block_count(BlockCountScaling::FewerWhenSmall, 10, 0.0),
            1
        );
        assert_eq!(
            scaled_block_count(BlockCountScaling::FewerWhenSmall, 10, 1.0),
            10
        );
        assert_eq!(
            scaled_block_count(BlockCountScaling::FewerWhenSmall, 10, 0.5),
            5
        );
    }

    #[test]
    fn zero_area_box_is_a_no_op() {
        let config = CensorConfig::default();
        let masker = RegionMasker::new(&config);

        let mut image = gradient(32, 32);
        let reference = image.clone();

        masker.apply(&mut image, &detection(5, 5, 0, 20)).unwrap();
        masker.apply(&mut image, &detection(5, 5, 20, 0)).unwrap();
        assert_eq!(image, reference);
    }

    #[test]
    fn box_fully_outside_the_image_is_a_no_op() {
        let config = CensorConfig::default();
        let masker = RegionMasker::new(&config);

        let mut image = gradient(32, 32);
        let reference = image.clone();

        masker.apply(&mut image, &detection(100, 100, 10, 10)).unwrap();
        masker.apply(&mut image, &detection(-50, -50, 10, 10)).unwrap();
        assert_eq!(image, reference);
    }

    #[test]
    fn pixelate_changes_only_the_detected_region() {
        let config = CensorConfig::default();
        let masker = RegionMasker::new(&config);

        let mut image = gradient(64, 64);
        let reference = image.clone();
        masker.apply(&mut image, &detection(8, 8, 16, 16)).unwrap();

        let expected = pixelate(
            &imageops::crop_imm(&reference, 8, 8, 16, 16).to_image(),
            3,
        );
        assert_eq!(
            imageops::crop_imm(&image, 8, 8, 16, 16).to_image(),
            expected
        );

        for (x, y, pixel) in image.enumerate_pixels() {
            let inside = (8..24).contains(&x) && (8..24).contains(&y);
            if !inside {
                assert_eq!(pixel, reference.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let config = CensorConfig::default();
        let masker = RegionMasker::new(&config);

        let mut image = gradient(32, 32);
        let reference = image.clone();
        masker.apply(&mut image, &detection(-4, 28, 12, 12)).unwrap();

        // Only the clipped 8x4 corner region may change.
        for (x, y, pixel) in image.enumerate_pixels() {
            let inside = x < 8 && y >= 28;
            if !inside {
                assert_eq!(pixel, reference.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn gaussian_blur_flattens_a_uniform_region_boundary() {
        let config = CensorConfig::new(CensorMethod::GaussianBlur);
        let masker = RegionMasker::new(&config);

        let mut image = RgbImage::from_pixel(32, 32, Rgb([50, 100, 150]));
        let reference = image.clone();
        masker.apply(&mut image, &detection(4, 4, 16, 16)).unwrap();

        // Blurring a uniform region is the identity.
        assert_eq!(image, reference);
    }

    #[test]
    fn image_method_without_overlay_is_a_config_error() {
        let config = CensorConfig::new(CensorMethod::Image);
        let masker = RegionMasker::new(&config);

        let mut image = gradient(32, 32);
        let err = masker.apply(&mut image, &detection(4, 4, 8, 8)).unwrap_err();
        assert!(matches!(err, CensorError::ConfigError { .. }));
    }

    #[test]
    fn overlay_with_zero_strength_leaves_the_image_unchanged() {
        let overlay = OverlaySource::new(
            RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])),
            AlphaMask::from_pixel(8, 8, Luma([1.0])),
        )
        .with_strength(0.0);
        let config = CensorConfig::new(CensorMethod::Image).with_overlay(overlay);
        let masker = RegionMasker::new(&config);

        let mut image = gradient(32, 32);
        let reference = image.clone();
        masker.apply(&mut image, &detection(4, 4, 8, 8)).unwrap();
        assert_eq!(image, reference);
    }

    #[test]
    fn overlay_replaces_the_region_at_full_strength() {
        let overlay = OverlaySource::new(
            RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])),
            AlphaMask::from_pixel(4, 4, Luma([1.0])),
        );
        let config = CensorConfig::new(CensorMethod::Image).with_overlay(overlay);
        let masker = RegionMasker::new(&config);

        let mut image = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        masker.apply(&mut image, &detection(4, 4, 8, 8)).unwrap();

        assert_eq!(*image.get_pixel(4, 4), Rgb([255, 0, 0]));
        assert_eq!(*image.get_pixel(11, 11), Rgb([255, 0, 0]));
        assert_eq!(*image.get_pixel(3, 3), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(12, 12), Rgb([0, 0, 0]));
    }
}
