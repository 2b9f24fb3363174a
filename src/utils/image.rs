//! Utility functions for image loading and region transforms.
//!
//! This module provides functions for loading and converting images, plus
//! the pixelation and alpha-compositing primitives used by the masking
//! engine. The primitives operate on plain `image` crate buffers and make
//! no assumptions about where their inputs come from.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use rayon::prelude::*;

use crate::core::errors::CensorError;

/// A single-channel f32 compositing mask with values in `[0, 1]`.
pub type AlphaMask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Converts a DynamicImage to an RgbImage.
pub fn dynamic_to_rgb(img: DynamicImage) -> RgbImage {
    img.to_rgb8()
}

/// Loads an image from a file path and converts it to RgbImage.
///
/// # Errors
///
/// Returns `CensorError::ImageLoad` if the image cannot be loaded from the
/// specified path.
pub fn load_image(path: &std::path::Path) -> Result<RgbImage, CensorError> {
    let img = image::open(path).map_err(CensorError::ImageLoad)?;
    Ok(dynamic_to_rgb(img))
}

/// Loads a batch of images from file paths in parallel.
///
/// Results preserve the input path order. Any failed load fails the whole
/// batch.
pub fn load_images<P: AsRef<std::path::Path> + Send + Sync>(
    paths: &[P],
) -> Result<Vec<RgbImage>, CensorError> {
    paths
        .par_iter()
        .map(|path| load_image(path.as_ref()))
        .collect()
}

/// Creates an RgbImage from raw pixel data.
///
/// The data must be in RGB format (3 bytes per pixel) and the length must
/// match the specified width and height.
pub fn create_rgb_image(width: u32, height: u32, data: Vec<u8>) -> Option<RgbImage> {
    if data.len() != (width * height * 3) as usize {
        return None;
    }

    ImageBuffer::from_raw(width, height, data)
}

/// Replaces a region with a coarse grid of `blocks` x `blocks` uniform
/// cells, each cell averaging its source pixels.
///
/// The region is downsampled with an averaging filter and upsampled back
/// with nearest-neighbor so each cell stays a flat color.
pub fn pixelate(region: &RgbImage, blocks: u32) -> RgbImage {
    let (width, height) = region.dimensions();
    if width == 0 || height == 0 {
        return region.clone();
    }

    let blocks = blocks.max(1);
    let cells = image::imageops::resize(region, blocks, blocks, FilterType::Triangle);
    image::imageops::resize(&cells, width, height, FilterType::Nearest)
}

/// Mean-filters a region with a `kernel` x `kernel` window.
///
/// The window is applied per channel; a kernel of 1 leaves the region
/// unchanged. Even kernel sizes round down to the nearest odd window.
pub fn box_blur(region: &RgbImage, kernel: u32) -> RgbImage {
    let radius = kernel / 2;
    if radius == 0 {
        return region.clone();
    }

    let (width, height) = region.dimensions();
    let channels: Vec<GrayImage> = (0..3)
        .map(|c| GrayImage::from_fn(width, height, |x, y| Luma([region.get_pixel(x, y).0[c]])))
        .collect();
    let blurred: Vec<GrayImage> = channels
        .iter()
        .map(|channel| imageproc::filter::box_filter(channel, radius, radius))
        .collect();

    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

/// Alpha-composites `overlay` onto `base` at `(x, y)`.
///
/// The per-pixel weight is the alpha mask value multiplied by `strength`,
/// clamped to `[0, 1]`. Overlay pixels falling outside the base image are
/// clipped, so the overlay may exceed the region it was sized for.
pub fn alpha_composite_at(
    base: &mut RgbImage,
    overlay: &RgbImage,
    alpha: &AlphaMask,
    x: i32,
    y: i32,
    strength: f32,
) {
    let (base_w, base_h) = base.dimensions();
    let (overlay_w, overlay_h) = overlay.dimensions();
    let (alpha_w, alpha_h) = alpha.dimensions();

    for oy in 0..overlay_h.min(alpha_h) {
        for ox in 0..overlay_w.min(alpha_w) {
            let bx = x + ox as i32;
            let by = y + oy as i32;
            if bx < 0 || by < 0 || bx >= base_w as i32 || by >= base_h as i32 {
                continue;
            }

            let weight = (alpha.get_pixel(ox, oy).0[0] * strength).clamp(0.0, 1.0);
            if weight == 0.0 {
                continue;
            }

            let top = overlay.get_pixel(ox, oy).0;
            let pixel = base.get_pixel_mut(bx as u32, by as u32);
            for c in 0..3 {
                let blended = top[c] as f32 * weight + pixel.0[c] as f32 * (1.0 - weight);
                pixel.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn create_rgb_image_checks_data_length() {
        assert!(create_rgb_image(2, 2, vec![0; 12]).is_some());
        assert!(create_rgb_image(2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn pixelate_produces_flat_cells() {
        let region = gradient(9, 9);
        let pixelated = pixelate(&region, 3);

        assert_eq!(pixelated.dimensions(), (9, 9));
        // Every pixel within a 3x3 cell shares the cell's color.
        for cell_y in 0..3u32 {
            for cell_x in 0..3u32 {
                let anchor = *pixelated.get_pixel(cell_x * 3, cell_y * 3);
                for dy in 0..3 {
                    for dx in 0..3 {
                        assert_eq!(*pixelated.get_pixel(cell_x * 3 + dx, cell_y * 3 + dy), anchor);
                    }
                }
            }
        }
    }

    #[test]
    fn pixelate_with_one_block_is_uniform() {
        let pixelated = pixelate(&gradient(8, 8), 1);
        let anchor = *pixelated.get_pixel(0, 0);
        assert!(pixelated.pixels().all(|&p| p == anchor));
    }

    #[test]
    fn box_blur_kernel_one_is_identity() {
        let region = gradient(5, 5);
        assert_eq!(box_blur(&region, 1), region);
    }

    #[test]
    fn box_blur_flattens_a_uniform_region() {
        let region = RgbImage::from_pixel(6, 6, Rgb([40, 80, 120]));
        let blurred = box_blur(&region, 3);
        assert!(blurred.pixels().all(|&p| p == Rgb([40, 80, 120])));
    }

    #[test]
    fn composite_with_zero_strength_changes_nothing() {
        let mut base = gradient(10, 10);
        let reference = base.clone();
        let overlay = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let alpha = AlphaMask::from_pixel(4, 4, Luma([1.0]));

        alpha_composite_at(&mut base, &overlay, &alpha, 2, 2, 0.0);
        assert_eq!(base, reference);
    }

    #[test]
    fn composite_with_full_weight_replaces_pixels() {
        let mut base = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let overlay = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        let alpha = AlphaMask::from_pixel(2, 2, Luma([1.0]));

        alpha_composite_at(&mut base, &overlay, &alpha, 3, 3, 1.0);
        assert_eq!(*base.get_pixel(3, 3), Rgb([255, 0, 0]));
        assert_eq!(*base.get_pixel(4, 4), Rgb([255, 0, 0]));
        assert_eq!(*base.get_pixel(2, 2), Rgb([0, 0, 0]));
        assert_eq!(*base.get_pixel(5, 5), Rgb([0, 0, 0]));
    }

    #[test]
    fn composite_clips_against_image_bounds() {
        let mut base = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let overlay = RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]));
        let alpha = AlphaMask::from_pixel(4, 4, Luma([1.0]));

        // Partially off the top-left corner; must not panic.
        alpha_composite_at(&mut base, &overlay, &alpha, -2, -2, 1.0);
        assert_eq!(*base.get_pixel(0, 0), Rgb([9, 9, 9]));
        assert_eq!(*base.get_pixel(1, 1), Rgb([9, 9, 9]));
        assert_eq!(*base.get_pixel(2, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn composite_strength_scales_the_mask() {
        let mut base = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        let overlay = RgbImage::from_pixel(2, 2, Rgb([200, 200, 200]));
        let alpha = AlphaMask::from_pixel(2, 2, Luma([0.5]));

        alpha_composite_at(&mut base, &overlay, &alpha, 0, 0, 1.0);
        assert_eq!(*base.get_pixel(0, 0), Rgb([100, 100, 100]));

        // Strength above 1 saturates the clamped weight.
        let mut base = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        alpha_composite_at(&mut base, &overlay, &alpha, 0, 0, 4.0);
        assert_eq!(*base.get_pixel(0, 0), Rgb([200, 200, 200]));
    }
}
