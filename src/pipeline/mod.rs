//! The censoring pipeline orchestrator.
//!
//! The orchestrator sequences the processing stages over a batch of
//! images: letterbox, inference, detection decoding, label filtering, and
//! per-detection masking. Images are independent of one another, so the
//! batch is processed in parallel; output order always matches input
//! order. A failure on any image aborts the whole batch call.

pub mod registry;

pub use registry::{OpRequest, OpResponse, OperationRegistry};

use std::sync::Arc;

use image::RgbImage;
use rayon::prelude::*;
use tracing::debug;

use crate::core::config::CensorConfig;
use crate::core::errors::{CensorError, CensorResult};
use crate::core::inference::DetectionModel;
use crate::labels::LabelFilter;
use crate::processors::letterbox::{Letterbox, to_input_tensor};
use crate::processors::mask::RegionMasker;
use crate::processors::postprocess::DetectionDecoder;

/// Detects and censors nudity regions over batches of images.
///
/// Holds one loaded model, one censor configuration, and one label filter;
/// all three are immutable for the lifetime of the instance, so one
/// `NudityCensor` can serve many batch calls.
#[derive(Debug)]
pub struct NudityCensor {
    model: Arc<DetectionModel>,
    config: CensorConfig,
    filter: LabelFilter,
}

impl NudityCensor {
    /// Creates a censoring pipeline.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the censor configuration is invalid, e.g.
    /// the `image` method without an overlay source.
    pub fn new(
        model: Arc<DetectionModel>,
        config: CensorConfig,
        filter: LabelFilter,
    ) -> CensorResult<Self> {
        config.validate()?;
        Ok(Self {
            model,
            config,
            filter,
        })
    }

    /// Censors a batch of images.
    ///
    /// Images may have differing sizes; each is processed independently
    /// and the output batch preserves input order and original dimensions.
    /// There is no partial-result path: the first per-image failure aborts
    /// the call.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty batch, and propagates any
    /// per-image letterbox, inference, decoding, or masking failure.
    pub fn censor(&self, images: Vec<RgbImage>) -> CensorResult<Vec<RgbImage>> {
        if images.is_empty() {
            return Err(CensorError::invalid_input("empty image batch"));
        }

        images
            .into_par_iter()
            .map(|image| self.censor_image(image))
            .collect()
    }

    /// Runs the full pipeline on one image.
    ///
    /// Masks are applied sequentially in detection order; a later
    /// detection sees the pixels already censored by earlier ones. That
    /// layering is intentional: overlapping survivors are rare after
    /// suppression but possible across classes.
    fn censor_image(&self, mut image: RgbImage) -> CensorResult<RgbImage> {
        let letterbox = Letterbox::new(self.model.input_width())?;
        let prepared = letterbox.apply(&image)?;
        let input = to_input_tensor(&prepared.image);

        let raw = self.model.run(&input)?;

        let decoder = DetectionDecoder::new(self.config.min_score);
        let detections = decoder.decode(
            &raw,
            prepared.resize_factor,
            prepared.pad_left,
            prepared.pad_top,
        )?;
        let detected = detections.len();
        let kept = self.filter.retain(detections);
        debug!(
            detected,
            censored = kept.len(),
            method = self.config.method.as_str(),
            "image processed"
        );

        let masker = RegionMasker::new(&self.config);
        for detection in &kept {
            masker.apply(&mut image, detection)?;
        }

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CensorMethod, OverlaySource};
    use crate::core::inference::RawInference;
    use crate::core::{Tensor4D, TensorD};
    use crate::labels::{Label, NUM_CLASSES};
    use crate::utils::image::{AlphaMask, pixelate};
    use image::imageops;
    use image::{Luma, Rgb};
    use ndarray::IxDyn;

    /// Inference stub returning a fixed raw output tensor.
    #[derive(Debug)]
    struct StubInference {
        raw: TensorD,
    }

    impl RawInference for StubInference {
        fn run(&self, input: &Tensor4D) -> CensorResult<TensorD> {
            assert_eq!(input.shape(), &[1, 3, 320, 320]);
            Ok(self.raw.clone())
        }
    }

    /// A model whose single high-confidence candidate decodes to the box
    /// (100, 100, 50, 50) at class 3 on a 640x480 input image.
    fn stub_model() -> Arc<DetectionModel> {
        let mut raw = TensorD::zeros(IxDyn(&[1, 4 + NUM_CLASSES, 2]));
        // 640x480 letterboxes to 320x240 (resize factor 2, pads 0/40):
        // center (62.5, 102.5), size 25x25 maps to (100, 100, 50, 50).
        raw[[0, 0, 0]] = 62.5;
        raw[[0, 1, 0]] = 102.5;
        raw[[0, 2, 0]] = 25.0;
        raw[[0, 3, 0]] = 25.0;
        raw[[0, 4 + 3, 0]] = 0.9;
        // Second candidate stays below every threshold.
        raw[[0, 4 + 7, 1]] = 0.05;

        Arc::new(DetectionModel::new(
            Box::new(StubInference { raw }),
            320,
            320,
            "images",
        ))
    }

    fn test_image() -> RgbImage {
        RgbImage::from_fn(640, 480, |x, y| {
            Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 253) as u8])
        })
    }

    #[test]
    fn pixelate_censors_exactly_the_detected_region() {
        let censor =
            NudityCensor::new(stub_model(), CensorConfig::default(), LabelFilter::none()).unwrap();

        let image = test_image();
        let reference = image.clone();
        let output = censor.censor(vec![image]).unwrap();
        assert_eq!(output.len(), 1);
        let output = &output[0];
        assert_eq!(output.dimensions(), (640, 480));

        let expected = pixelate(
            &imageops::crop_imm(&reference, 100, 100, 50, 50).to_image(),
            3,
        );
        assert_eq!(
            imageops::crop_imm(output, 100, 100, 50, 50).to_image(),
            expected
        );

        for (x, y, pixel) in output.enumerate_pixels() {
            let inside = (100..150).contains(&x) && (100..150).contains(&y);
            if !inside {
                assert_eq!(pixel, reference.get_pixel(x, y), "pixel changed at {x},{y}");
            }
        }
    }

    #[test]
    fn exempt_class_leaves_the_image_untouched() {
        let mut filter = LabelFilter::none();
        filter.exempt(Label::FemaleGenitaliaExposed);
        let censor = NudityCensor::new(stub_model(), CensorConfig::default(), filter).unwrap();

        let image = test_image();
        let reference = image.clone();
        let output = censor.censor(vec![image]).unwrap();
        assert_eq!(output[0], reference);
    }

    #[test]
    fn overlay_with_zero_strength_approximates_the_input() {
        let overlay = OverlaySource::new(
            RgbImage::from_pixel(16, 16, Rgb([255, 255, 255])),
            AlphaMask::from_pixel(16, 16, Luma([1.0])),
        )
        .with_strength(0.0);
        let config = CensorConfig::new(CensorMethod::Image).with_overlay(overlay);
        let censor = NudityCensor::new(stub_model(), config, LabelFilter::none()).unwrap();

        let image = test_image();
        let reference = image.clone();
        let output = censor.censor(vec![image]).unwrap();
        assert_eq!(output[0], reference);
    }

    #[test]
    fn batch_preserves_order_and_dimensions() {
        let censor =
            NudityCensor::new(stub_model(), CensorConfig::default(), LabelFilter::none()).unwrap();

        let a = test_image();
        let b = RgbImage::from_pixel(640, 480, Rgb([77, 77, 77]));
        let output = censor.censor(vec![a.clone(), b.clone()]).unwrap();

        assert_eq!(output.len(), 2);
        // Each output matches censoring its own input individually.
        let single_a = censor.censor(vec![a]).unwrap();
        let single_b = censor.censor(vec![b]).unwrap();
        assert_eq!(output[0], single_a[0]);
        assert_eq!(output[1], single_b[0]);
    }

    #[test]
    fn empty_batch_is_invalid_input() {
        let censor =
            NudityCensor::new(stub_model(), CensorConfig::default(), LabelFilter::none()).unwrap();
        assert!(matches!(
            censor.censor(Vec::new()),
            Err(CensorError::InvalidInput { .. })
        ));
    }

    #[test]
    fn inference_failure_aborts_the_batch() {
        #[derive(Debug)]
        struct FailingInference;

        impl RawInference for FailingInference {
            fn run(&self, _input: &Tensor4D) -> CensorResult<TensorD> {
                Err(CensorError::inference(std::io::Error::other(
                    "provider down",
                )))
            }
        }

        let model = Arc::new(DetectionModel::new(
            Box::new(FailingInference),
            320,
            320,
            "images",
        ));
        let censor =
            NudityCensor::new(model, CensorConfig::default(), LabelFilter::none()).unwrap();

        let err = censor.censor(vec![test_image(), test_image()]).unwrap_err();
        assert!(matches!(err, CensorError::Inference(_)));
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = CensorConfig::new(CensorMethod::Image);
        assert!(matches!(
            NudityCensor::new(stub_model(), config, LabelFilter::none()),
            Err(CensorError::ConfigError { .. })
        ));
    }
}
