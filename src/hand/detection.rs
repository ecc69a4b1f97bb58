//! Palm detection.

use std::path::Path;

use once_cell::sync::Lazy;

use crate::{
    detection::{
        ssd::{Anchor, Anchors, LayerInfo},
        Detection, Network,
    },
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
    num::sigmoid,
    resolution::Resolution,
};

/// A keypoint of a palm [`Detection`], in the order the network reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

/// A list of all [`Keypoint`]s.
pub const ALL_KEYPOINTS: &[Keypoint] = &[
    Keypoint::Wrist,
    Keypoint::IndexFingerMcp,
    Keypoint::MiddleFingerMcp,
    Keypoint::RingFingerMcp,
    Keypoint::PinkyMcp,
    Keypoint::ThumbCmc,
    Keypoint::ThumbMcp,
];

static ANCHORS: Lazy<Anchors> =
    Lazy::new(|| Anchors::calculate(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)]));

/// Number of values the network outputs per anchor: a box and the keypoints.
const BOX_PARAMS: usize = 4 + 2 * ALL_KEYPOINTS.len();

/// MediaPipe's palm detection network (`palm_detection_{lite,full}.onnx`).
///
/// Both variants take a 192x192 RGB image and share the same output layout. The full variant is
/// about 15% slower on CPU.
pub struct PalmDetectionNetwork {
    cnn: Cnn,
}

impl PalmDetectionNetwork {
    /// Loads the network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::debug!("loading palm detection network from '{}'", path.display());
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for PalmDetectionNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Vec<Detection>) {
        extract_outputs(
            self.cnn.input_resolution(),
            outputs,
            threshold,
            detections,
        );
    }
}

fn extract_outputs(
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) {
    let num_anchors = ANCHORS.anchor_count();
    let boxes = &outputs[0];
    let confidences = &outputs[1];

    assert_eq!(boxes.shape(), &[1, num_anchors, BOX_PARAMS]);
    assert_eq!(confidences.shape(), &[1, num_anchors, 1]);

    for (index, view) in confidences.index([0]).iter().enumerate() {
        let conf = sigmoid(view.as_slice()[0]);
        if conf < thresh {
            continue;
        }

        let box_params = boxes.index([0, index]).as_slice();
        detections.push(extract_detection(
            &ANCHORS[index],
            input_res,
            box_params,
            conf,
        ));
    }
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let input_w = input_res.width() as f32;
    let input_h = input_res.height() as f32;
    let (ax, ay) = (anchor.x_center() * input_w, anchor.y_center() * input_h);

    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| crate::detection::Keypoint::new(xy[0] + ax, xy[1] + ay))
        .collect();

    Detection::with_keypoints(
        confidence,
        crate::detection::BoundingRect::from_center(
            box_params[0] + ax,
            box_params[1] + ay,
            box_params[2],
            box_params[3],
        ),
        keypoints,
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::nn::tensor::Tensor;

    use super::*;

    const INPUT: Resolution = Resolution::new(192, 192);

    /// Network outputs with a single confident anchor.
    fn outputs(anchor: usize, raw_score: f32, params: [f32; BOX_PARAMS]) -> Outputs {
        let n = ANCHORS.anchor_count();
        let boxes = Tensor::from_array_shape_fn([1, n, BOX_PARAMS], |[_, i, p]| {
            if i == anchor {
                params[p]
            } else {
                0.0
            }
        });
        let scores = Tensor::from_array_shape_fn([1, n, 1], |[_, i, _]| {
            if i == anchor {
                raw_score
            } else {
                -20.0
            }
        });
        [boxes, scores].into_iter().collect()
    }

    #[test]
    fn keypoint_order() {
        assert_eq!(BOX_PARAMS, 18);
        for (i, kp) in ALL_KEYPOINTS.iter().enumerate() {
            assert_eq!(*kp as usize, i);
        }
    }

    #[test]
    fn decodes_relative_to_anchor() {
        let mut params = [0.0; BOX_PARAMS];
        params[..4].copy_from_slice(&[2.0, -3.0, 40.0, 30.0]);
        // Wrist below, middle finger MCP above the anchor.
        params[4..6].copy_from_slice(&[0.0, 10.0]);
        params[8..10].copy_from_slice(&[1.0, -10.0]);

        let mut dets = Vec::new();
        extract_outputs(INPUT, &outputs(1000, 5.0, params), 0.5, &mut dets);
        assert_eq!(dets.len(), 1);

        let det = &dets[0];
        let anchor = ANCHORS[1000];
        let (ax, ay) = (anchor.x_center() * 192.0, anchor.y_center() * 192.0);
        assert_relative_eq!(det.confidence(), sigmoid(5.0));

        let rect = det.bounding_rect();
        assert_relative_eq!(rect.x_center(), ax + 2.0);
        assert_relative_eq!(rect.y_center(), ay - 3.0);
        assert_relative_eq!(rect.width(), 40.0);
        assert_relative_eq!(rect.height(), 30.0);

        assert_eq!(det.keypoints().len(), ALL_KEYPOINTS.len());
        let wrist = det.keypoints()[Keypoint::Wrist as usize];
        assert_relative_eq!(wrist.y(), ay + 10.0);
        let mcp = det.keypoints()[Keypoint::MiddleFingerMcp as usize];
        assert_relative_eq!(mcp.x(), ax + 1.0);
        assert_relative_eq!(mcp.y(), ay - 10.0);
    }

    #[test]
    fn drops_low_confidence() {
        let mut dets = Vec::new();
        extract_outputs(INPUT, &outputs(7, 0.0, [0.0; BOX_PARAMS]), 0.7, &mut dets);
        assert!(dets.is_empty());

        extract_outputs(INPUT, &outputs(7, 0.0, [0.0; BOX_PARAMS]), 0.5, &mut dets);
        assert_eq!(dets.len(), 1);
    }

    #[test]
    #[should_panic]
    fn rejects_foreign_model() {
        let outputs: Outputs = [Tensor::from([0.0; 4]), Tensor::from(0.0)]
            .into_iter()
            .collect();
        extract_outputs(INPUT, &outputs, 0.5, &mut Vec::new());
    }
}
