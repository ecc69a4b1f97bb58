//! Hand landmark estimation.

use std::{
    ops::{Index, IndexMut},
    path::Path,
};

use crate::{
    image::{draw_line, draw_marker, AsImageViewMut, Color, ImageViewMut},
    iter::zip_exact,
    landmark::{Confidence, Estimate, Landmarks, Network},
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
    resolution::Resolution,
};

/// Number of landmarks the network locates on a hand.
pub const NUM_LANDMARKS: usize = 21;

/// Output of [`HandLandmarkNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        LandmarkResult {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
        }
    }
}

impl LandmarkResult {
    /// Returns the 3D landmark positions in the input image's coordinate system.
    pub fn landmark_positions(&self) -> impl ExactSizeIterator<Item = [f32; 3]> + '_ {
        self.landmarks.positions().iter().copied()
    }

    /// Returns a landmark's position in the input image's coordinate system.
    pub fn landmark_position(&self, idx: LandmarkIdx) -> [f32; 3] {
        self.landmarks.positions()[idx as usize]
    }

    /// Likelihood that the crop actually contains a hand.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Converts the landmarks to image-relative coordinates, dividing by the size of the frame
    /// they were estimated in.
    ///
    /// Landmarks of a hand that is partially out of view may lie outside of `0.0..=1.0`. They are
    /// kept as-is, so that their relative order is preserved.
    pub fn normalized(&self, frame: Resolution) -> LandmarkSet {
        let (w, h) = (frame.width().max(1) as f32, frame.height().max(1) as f32);
        let mut set = LandmarkSet::default();
        for (out, [x, y, _]) in zip_exact(set.0.iter_mut(), self.landmark_positions()) {
            *out = NormalizedLandmark::new(x / w, y / h);
        }
        set
    }

    /// Draws the hand skeleton: light gray connections with a red marker on every landmark.
    pub fn draw<I: AsImageViewMut>(&self, target: &mut I) {
        self.draw_impl(&mut target.as_view_mut());
    }

    fn draw_impl(&self, target: &mut ImageViewMut<'_>) {
        let px = |[x, y, _]: [f32; 3]| (x.round() as i32, y.round() as i32);

        for &(a, b) in CONNECTIVITY {
            let (ax, ay) = px(self.landmark_position(a));
            let (bx, by) = px(self.landmark_position(b));
            draw_line(target, ax, ay, bx, by)
                .color(Color::from_rgb8(224, 224, 224))
                .stroke_width(2);
        }
        for pos in self.landmark_positions() {
            let (x, y) = px(pos);
            draw_marker(target, x, y);
        }
    }
}

impl Estimate for LandmarkResult {
    #[inline]
    fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }
}

impl Confidence for LandmarkResult {
    #[inline]
    fn confidence(&self) -> f32 {
        self.presence
    }
}

/// Names for the hand pose landmarks, in network output order.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (ThumbCmc, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

/// A landmark position relative to the frame: `(0, 0)` is the top-left corner, `(1, 1)` the
/// bottom-right one. `y` grows downwards. Landmarks outside of the frame have coordinates outside
/// of `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
}

impl NormalizedLandmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The 21 landmarks of one hand, indexable by [`LandmarkIdx`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LandmarkSet(pub [NormalizedLandmark; NUM_LANDMARKS]);

impl LandmarkSet {
    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedLandmark> {
        self.0.iter()
    }
}

impl Index<LandmarkIdx> for LandmarkSet {
    type Output = NormalizedLandmark;

    fn index(&self, idx: LandmarkIdx) -> &NormalizedLandmark {
        &self.0[idx as usize]
    }
}

impl IndexMut<LandmarkIdx> for LandmarkSet {
    fn index_mut(&mut self, idx: LandmarkIdx) -> &mut NormalizedLandmark {
        &mut self.0[idx as usize]
    }
}

/// MediaPipe's hand landmark network (`hand_landmark_{lite,full}.onnx`).
///
/// Takes a 224x224 crop around one hand. The full variant takes about 25-30% longer to infer on
/// CPU.
pub struct HandLandmarkNetwork {
    cnn: Cnn,
}

impl HandLandmarkNetwork {
    /// Loads the network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::debug!("loading hand landmark network from '{}'", path.display());
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for HandLandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) {
        extract(outputs, estimate);
    }
}

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) {
    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];

    assert_eq!(screen_landmarks.shape(), &[1, NUM_LANDMARKS * 3]);
    assert_eq!(presence_flag.shape(), &[1, 1]);

    estimate.presence = presence_flag.index([0, 0]).as_singular();
    for (xyz, out) in zip_exact(
        screen_landmarks.index([0]).as_slice().chunks_exact(3),
        estimate.landmarks.positions_mut(),
    ) {
        out.copy_from_slice(xyz);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{image::Image, nn::tensor::Tensor};

    use super::*;

    fn outputs(presence: f32) -> Outputs {
        let landmarks = Tensor::from_array_shape_fn([1, NUM_LANDMARKS * 3], |[_, i]| i as f32);
        [
            landmarks,
            Tensor::from_array_shape_fn([1, 1], |_| presence),
            Tensor::from_array_shape_fn([1, 1], |_| 0.5),
            Tensor::from_array_shape_fn([1, NUM_LANDMARKS * 3], |_| 0.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn extract_outputs() {
        let mut res = LandmarkResult::default();
        extract(&outputs(0.9), &mut res);

        assert_eq!(res.confidence(), 0.9);
        assert_eq!(res.landmark_position(LandmarkIdx::Wrist), [0.0, 1.0, 2.0]);
        assert_eq!(
            res.landmark_position(LandmarkIdx::PinkyTip),
            [60.0, 61.0, 62.0]
        );

        extract(&outputs(0.1), &mut res);
        assert_eq!(res.presence(), 0.1);
    }

    #[test]
    fn normalize() {
        let mut res = LandmarkResult::default();
        res.landmarks_mut().positions_mut()[LandmarkIdx::IndexFingerTip as usize] =
            [320.0, 120.0, 5.0];
        res.landmarks_mut().positions_mut()[LandmarkIdx::ThumbTip as usize] = [-64.0, 600.0, 0.0];

        let set = res.normalized(Resolution::VGA);
        let tip = set[LandmarkIdx::IndexFingerTip];
        assert_relative_eq!(tip.x, 0.5);
        assert_relative_eq!(tip.y, 0.25);

        // Out of frame, not clamped.
        let thumb = set[LandmarkIdx::ThumbTip];
        assert_relative_eq!(thumb.x, -0.1);
        assert_relative_eq!(thumb.y, 1.25);
    }

    #[test]
    fn tips_above_frame_keep_their_order() {
        let mut res = LandmarkResult::default();
        res.landmarks_mut().map_positions(|_| [320.0, 200.0, 0.0]);
        res.landmarks_mut().positions_mut()[LandmarkIdx::ThumbTip as usize] = [400.0, -30.0, 0.0];
        res.landmarks_mut().positions_mut()[LandmarkIdx::IndexFingerTip as usize] =
            [300.0, -10.0, 0.0];

        let set = res.normalized(Resolution::VGA);
        assert!(set[LandmarkIdx::ThumbTip].y < set[LandmarkIdx::IndexFingerTip].y);
        assert_eq!(
            crate::gesture::classify(&set),
            Some(crate::gesture::Gesture::ThumbsUp)
        );
    }

    #[test]
    fn connectivity_covers_every_landmark() {
        let mut seen = [false; NUM_LANDMARKS];
        for &(a, b) in CONNECTIVITY {
            seen[a as usize] = true;
            seen[b as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn draw_skeleton() {
        let mut res = LandmarkResult::default();
        res.landmarks_mut().map_positions(|_| [10.0, 10.0, 0.0]);
        res.landmarks_mut().positions_mut()[LandmarkIdx::MiddleFingerTip as usize] =
            [10.0, 30.0, 0.0];

        let mut image = Image::new(40, 40);
        res.draw(&mut image);
        assert_eq!(image.get(10, 10), Color::RED);
        let gray = Color::from_rgb8(224, 224, 224);
        assert!((9..=11).any(|x| image.get(x, 20) == gray));
        assert_eq!(image.get(35, 35), Color::NULL);
    }
}
