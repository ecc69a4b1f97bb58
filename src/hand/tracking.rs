//! Single-hand tracking.
//!
//! The palm detector only runs while no hand is being tracked. Once a palm is found, the landmark
//! network follows the hand from frame to frame, and detection resumes when the landmark
//! network's presence score drops below the tracking threshold.

use nalgebra::{Point2, Vector2};

use crate::{
    config::Config,
    detection::{self, Detection, Detector},
    image::{Image, Rect},
    landmark::{self, Estimator, LandmarkTracker},
    num::TotalF32,
    timer::Timer,
};

use super::{
    detection::{Keypoint, PalmDetectionNetwork},
    landmark::{HandLandmarkNetwork, LandmarkResult},
};

/// How far the palm box center is moved towards the fingers, relative to the box height.
const ROI_SHIFT: f32 = 0.5;
/// Side length of the hand RoI, relative to the longer side of the palm box.
const ROI_SCALE: f32 = 2.6;

/// Follows at most one hand through a sequence of frames.
pub struct HandTracker {
    detector: Detector,
    tracker: LandmarkTracker<LandmarkResult>,
    t_track: Timer,
}

impl HandTracker {
    /// Minimum palm detection confidence to start tracking a hand.
    pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.7;

    /// Minimum landmark presence to keep tracking a hand.
    pub const DEFAULT_TRACKING_THRESHOLD: f32 = 0.5;

    pub fn new<D, L>(detector: D, landmarker: L) -> Self
    where
        D: detection::Network,
        L: landmark::Network<Output = LandmarkResult>,
    {
        let mut detector = Detector::new(detector);
        detector.set_threshold(Self::DEFAULT_DETECTION_THRESHOLD);
        let mut tracker = LandmarkTracker::new(Estimator::new(landmarker));
        tracker.set_loss_threshold(Self::DEFAULT_TRACKING_THRESHOLD);
        Self {
            detector,
            tracker,
            t_track: Timer::new("track"),
        }
    }

    /// Loads the palm detection and hand landmark networks selected by `config`.
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        log::info!(
            "loading {} hand models from '{}'",
            config.variant(),
            config.model_dir().display(),
        );
        Ok(Self::new(
            PalmDetectionNetwork::load(config.palm_detection_model())?,
            HandLandmarkNetwork::load(config.hand_landmark_model())?,
        ))
    }

    /// Finds or follows a hand in `image`.
    ///
    /// Returns the hand's landmarks in `image` coordinates, or `None` if there is no hand in view.
    pub fn track(&mut self, image: &Image) -> anyhow::Result<Option<&LandmarkResult>> {
        let guard = self.t_track.start();

        if self.tracker.roi().is_none() {
            let detections = self.detector.detect(image)?;
            let Some(palm) = detections.iter().max_by_key(|det| TotalF32(det.confidence())) else {
                return Ok(None);
            };

            let roi = palm_to_hand_roi(palm);
            log::debug!(
                "palm detected with confidence {:.2}, tracking {roi:?}",
                palm.confidence(),
            );
            self.tracker.set_roi(roi);
        }

        let result = self.tracker.track(image)?;
        if result.is_none() {
            log::debug!("hand lost");
        }
        drop(guard);
        Ok(result)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_track]
            .into_iter()
            .chain(self.detector.timers())
            .chain(self.tracker.timers())
    }
}

/// Computes the region of a whole hand from a palm detection.
///
/// The palm box is moved towards the fingers (along the wrist to middle finger MCP direction),
/// made square, and enlarged so that the fingers fit.
pub fn palm_to_hand_roi(palm: &Detection) -> Rect {
    let rect = palm.bounding_rect();
    let keypoint = |kp: Keypoint| {
        palm.keypoints()
            .get(kp as usize)
            .map(|kp| Point2::new(kp.x(), kp.y()))
    };

    let up = match (keypoint(Keypoint::Wrist), keypoint(Keypoint::MiddleFingerMcp)) {
        (Some(wrist), Some(mcp)) => (mcp - wrist)
            .try_normalize(f32::EPSILON)
            .unwrap_or(-Vector2::y()),
        _ => -Vector2::y(),
    };

    let center = Point2::new(rect.x_center(), rect.y_center()) + up * (rect.height() * ROI_SHIFT);
    let size = rect.width().max(rect.height()) * ROI_SCALE;
    detection::BoundingRect::from_center(center.x, center.y, size, size).to_rect()
}

#[cfg(test)]
mod tests {
    use crate::{
        config::MODEL_DIR_VAR,
        detection::{BoundingRect, Keypoint as DetKeypoint},
    };

    use super::*;

    fn palm(wrist: (f32, f32), mcp: (f32, f32)) -> Detection {
        let mut keypoints = vec![DetKeypoint::new(0.0, 0.0); 7];
        keypoints[Keypoint::Wrist as usize] = DetKeypoint::new(wrist.0, wrist.1);
        keypoints[Keypoint::MiddleFingerMcp as usize] = DetKeypoint::new(mcp.0, mcp.1);
        Detection::with_keypoints(
            0.9,
            BoundingRect::from_center(100.0, 100.0, 40.0, 40.0),
            keypoints,
        )
    }

    #[test]
    fn upright_hand() {
        let roi = palm_to_hand_roi(&palm((100.0, 120.0), (100.0, 90.0)));
        assert_eq!(roi, Rect::from_top_left(48, 28, 104, 104));
    }

    #[test]
    fn sideways_hand() {
        // Fingers pointing right.
        let roi = palm_to_hand_roi(&palm((80.0, 100.0), (110.0, 100.0)));
        assert_eq!(roi, Rect::from_top_left(68, 48, 104, 104));
    }

    #[test]
    fn degenerate_keypoints() {
        let expected = Rect::from_top_left(48, 28, 104, 104);
        assert_eq!(palm_to_hand_roi(&palm((5.0, 5.0), (5.0, 5.0))), expected);

        let no_keypoints = Detection::with_keypoints(
            0.9,
            BoundingRect::from_center(100.0, 100.0, 40.0, 40.0),
            Vec::new(),
        );
        assert_eq!(palm_to_hand_roi(&no_keypoints), expected);
    }

    #[test]
    fn non_square_palm() {
        let det = Detection::with_keypoints(
            0.9,
            BoundingRect::from_center(50.0, 50.0, 10.0, 20.0),
            Vec::new(),
        );
        let roi = palm_to_hand_roi(&det);
        assert_eq!(roi, Rect::from_center(50, 40, 52, 52));
    }

    #[test]
    fn missing_models() {
        let config = Config::from_lookup(|var| {
            Ok((var == MODEL_DIR_VAR).then(|| "/nonexistent/handsign-models".to_string()))
        })
        .unwrap();
        assert!(HandTracker::load(&config).is_err());
    }
}
