//! Utility functions for the censoring pipeline.
//!
//! This module provides image loading helpers, the pixelation and
//! compositing primitives used by the masking engine, and logging setup.

pub mod image;

pub use image::{
    AlphaMask, alpha_composite_at, box_blur, create_rgb_image, dynamic_to_rgb, load_image,
    load_images, pixelate,
};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and
/// formatting layer. It's typically called at the start of an application
/// to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
