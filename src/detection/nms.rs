//! Non-maximum suppression.
//!
//! SSD networks report the same object several times from neighboring anchors. Non-maximum
//! suppression collapses each cluster of overlapping detections into its confidence-weighted mean,
//! which jitters less from frame to frame than keeping only the best detection.

use crate::{iter::zip_exact, num::TotalF32};

use super::{BoundingRect, Detection, Keypoint};

pub struct NonMaxSuppression {
    iou_thresh: f32,
    cluster: Vec<Detection>,
    out: Vec<Detection>,
}

impl NonMaxSuppression {
    /// Detections overlapping by at least this much IoU are considered duplicates.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            cluster: Vec::new(),
            out: Vec::new(),
        }
    }

    /// Replaces the contents of `detections` with the suppressed set, most confident first.
    pub fn process(&mut self, detections: &mut Vec<Detection>) {
        self.out.clear();

        // Ascending, so that `pop` yields the most confident remaining detection.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            let seed_rect = seed.bounding_rect();
            let thresh = self.iou_thresh;
            let is_duplicate = |det: &Detection| seed_rect.iou(&det.bounding_rect()) >= thresh;

            self.cluster.clear();
            let mut i = 0;
            while i < detections.len() {
                if is_duplicate(&detections[i]) {
                    self.cluster.push(detections.remove(i));
                } else {
                    i += 1;
                }
            }
            self.cluster.push(seed);
            self.out.push(weighted_average(&self.cluster));
        }

        detections.clear();
        detections.append(&mut self.out);
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Averages a cluster of detections, weighted by confidence. The last detection is the seed,
/// whose confidence is kept.
fn weighted_average(cluster: &[Detection]) -> Detection {
    let Some(seed) = cluster.last() else {
        unreachable!("clusters always contain their seed");
    };

    let mut keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    let (mut xc, mut yc, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let mut total = 0.0;
    for det in cluster {
        let weight = det.confidence();
        total += weight;

        let rect = det.bounding_rect();
        xc += rect.x_center() * weight;
        yc += rect.y_center() * weight;
        w += rect.width() * weight;
        h += rect.height() * weight;
        for (acc, kp) in zip_exact(keypoints.iter_mut(), det.keypoints()) {
            acc.x += kp.x * weight;
            acc.y += kp.y * weight;
        }
    }

    if total <= 0.0 {
        return seed.clone();
    }
    for kp in &mut keypoints {
        kp.x /= total;
        kp.y /= total;
    }
    Detection::with_keypoints(
        seed.confidence(),
        BoundingRect::from_center(xc / total, yc / total, w / total, h / total),
        keypoints,
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn palm(confidence: f32, xc: f32) -> Detection {
        Detection::with_keypoints(
            confidence,
            BoundingRect::from_center(xc, 0.0, 10.0, 10.0),
            vec![Keypoint::new(xc, 5.0)],
        )
    }

    #[test]
    fn most_confident_first() {
        let mut nms = NonMaxSuppression::new();

        let mut dets = vec![palm(0.8, 0.0), palm(0.9, 1.0), palm(0.95, 100.0)];
        nms.process(&mut dets);
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].confidence(), 0.95);
        assert_relative_eq!(dets[0].bounding_rect().x_center(), 100.0);
        assert_eq!(dets[1].confidence(), 0.9);
    }

    #[test]
    fn average_merges_cluster() {
        let mut nms = NonMaxSuppression::new();

        let mut dets = vec![palm(1.0, 0.0), palm(0.5, 3.0)];
        nms.process(&mut dets);
        assert_eq!(dets.len(), 1);

        let merged = &dets[0];
        assert_eq!(merged.confidence(), 1.0);
        assert_relative_eq!(merged.bounding_rect().x_center(), 1.0);
        assert_relative_eq!(merged.bounding_rect().width(), 10.0);
        assert_relative_eq!(merged.keypoints()[0].x(), 1.0);
        assert_relative_eq!(merged.keypoints()[0].y(), 5.0);
    }

    #[test]
    fn disjoint_detections_survive() {
        let mut nms = NonMaxSuppression::new();
        let mut dets = vec![palm(0.7, 0.0), palm(0.7, 50.0), palm(0.7, 100.0)];
        nms.process(&mut dets);
        assert_eq!(dets.len(), 3);
    }

    #[test]
    fn empty_input() {
        let mut nms = NonMaxSuppression::new();
        let mut dets = Vec::new();
        nms.process(&mut dets);
        assert!(dets.is_empty());
    }
}
