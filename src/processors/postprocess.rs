//! Detection decoding and non-max suppression.
//!
//! Raw model output is a `[1, 4 + num_classes, N]` tensor: each of the N
//! candidate columns carries a box center/size followed by per-class
//! scores. The decoder thresholds candidates on their best class score,
//! maps boxes back to original-image coordinates through the letterbox
//! parameters, and deduplicates overlapping boxes with class-agnostic
//! non-max suppression.

use std::cmp::Ordering;

use ndarray::Ix3;

use crate::core::TensorD;
use crate::core::errors::{CensorError, CensorResult};
use crate::labels::NUM_CLASSES;

/// Score threshold applied by the suppression stage, independent of the
/// configured minimum score.
pub const NMS_SCORE_THRESHOLD: f32 = 0.25;

/// IoU threshold above which an overlapping lower-scoring box is discarded.
pub const NMS_IOU_THRESHOLD: f32 = 0.45;

/// An axis-aligned box in original-image pixel coordinates.
///
/// Coordinates may exceed the image bounds at the edges; consumers clip
/// before indexing pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BBox {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Box width.
    pub width: i32,
    /// Box height.
    pub height: i32,
}

impl BBox {
    /// Creates a box from its left/top corner and size.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection-over-union overlap with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x.max(other.x) as f32;
        let y1 = self.y.max(other.y) as f32;
        let x2 = (self.x + self.width).min(other.x + other.width) as f32;
        let y2 = (self.y + self.height).min(other.y + other.height) as f32;

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let area_a = (self.width as f32) * (self.height as f32);
        let area_b = (other.width as f32) * (other.height as f32);
        let union = area_a + area_b - intersection;

        if union > 0.0 { intersection / union } else { 0.0 }
    }
}

/// A decoded detection: class, confidence, and box in original-image
/// coordinates. Immutable once produced.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Detection {
    /// Class id into the label table.
    pub class_id: usize,
    /// Best class score, in `[0, 1]`.
    pub score: f32,
    /// Box in original-image pixel coordinates.
    pub bbox: BBox,
}

/// Converts raw model output into deduplicated labeled detections.
#[derive(Debug, Clone, Copy)]
pub struct DetectionDecoder {
    min_score: f32,
}

impl DetectionDecoder {
    /// Creates a decoder keeping candidates whose best class score is at
    /// least `min_score`.
    pub fn new(min_score: f32) -> Self {
        Self { min_score }
    }

    /// Decodes one raw output tensor.
    ///
    /// Boxes are mapped back to original-image coordinates by removing the
    /// letterbox padding and multiplying by the diagonal-ratio resize
    /// factor. Survivor order is deterministic: descending score, with the
    /// candidate index breaking ties.
    ///
    /// # Errors
    ///
    /// Returns `ModelMismatch` if the output is not a
    /// `[1, 4 + num_classes, N]` tensor; this indicates the wrong model
    /// file was loaded for this pipeline.
    pub fn decode(
        &self,
        raw: &TensorD,
        resize_factor: f32,
        pad_left: u32,
        pad_top: u32,
    ) -> CensorResult<Vec<Detection>> {
        let view = raw.view().into_dimensionality::<Ix3>().map_err(|_| {
            CensorError::model_mismatch(format!(
                "expected a 3-D output tensor, got shape {:?}",
                raw.shape()
            ))
        })?;

        let shape = view.shape();
        if shape[0] != 1 || shape[1] != 4 + NUM_CLASSES {
            return Err(CensorError::model_mismatch(format!(
                "expected output shape [1, {}, N], got {:?}",
                4 + NUM_CLASSES,
                shape
            )));
        }

        let candidates = shape[2];
        let mut detections = Vec::new();
        for i in 0..candidates {
            let mut score = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in 0..NUM_CLASSES {
                let s = view[[0, 4 + c, i]];
                if s > score {
                    score = s;
                    class_id = c;
                }
            }
            if score < self.min_score {
                continue;
            }

            let x = view[[0, 0, i]];
            let y = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];

            let left = ((x - w * 0.5 - pad_left as f32) * resize_factor).round() as i32;
            let top = ((y - h * 0.5 - pad_top as f32) * resize_factor).round() as i32;
            let width = (w * resize_factor).round() as i32;
            let height = (h * resize_factor).round() as i32;

            detections.push(Detection {
                class_id,
                score,
                bbox: BBox::new(left, top, width, height),
            });
        }

        Ok(non_max_suppression(detections))
    }
}

/// Class-agnostic greedy non-max suppression.
///
/// Candidates below [`NMS_SCORE_THRESHOLD`] are dropped outright. The rest
/// are visited in (score desc, index asc) order; each kept box suppresses
/// every remaining box overlapping it beyond [`NMS_IOU_THRESHOLD`].
fn non_max_suppression(detections: Vec<Detection>) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    let mut indices: Vec<usize> = (0..detections.len())
        .filter(|&i| detections[i].score >= NMS_SCORE_THRESHOLD)
        .collect();
    indices.sort_by(|&a, &b| {
        detections[b]
            .score
            .partial_cmp(&detections[a].score)
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut suppressed = vec![false; detections.len()];
    let mut keep = Vec::new();

    for &i in &indices {
        if suppressed[i] {
            continue;
        }
        keep.push(i);

        for &j in &indices {
            if i != j
                && !suppressed[j]
                && detections[i].bbox.iou(&detections[j].bbox) > NMS_IOU_THRESHOLD
            {
                suppressed[j] = true;
            }
        }
    }

    keep.into_iter().map(|i| detections[i].clone()).collect()
}
