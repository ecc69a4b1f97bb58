//! Rule-based hand gesture classification.
//!
//! A gesture is recognized from the relative positions of the five fingertips alone. The rules in
//! [`RULES`] are checked in order and the first one that matches wins, so a hand that satisfies
//! several of them gets the label of the earliest.
//!
//! Coordinates are image-relative with `y` growing downwards: a smaller `y` is higher up.

use std::fmt;

use crate::{
    hand::landmark::{LandmarkIdx, LandmarkSet, NormalizedLandmark},
    image::{draw_text, AsImageViewMut, Color},
};

/// Where [`Gesture::draw`] puts the label (left end of the text baseline), in pixels.
pub const LABEL_POSITION: (i32, i32) = (50, 50);

/// A recognized hand gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    ThumbsUp,
    Peace,
    MiddleFinger,
}

/// Classification rules, in priority order.
pub const RULES: &[(Gesture, fn(&FingerTips) -> bool)] = &[
    (Gesture::ThumbsUp, is_thumbs_up),
    (Gesture::Peace, is_peace),
    (Gesture::MiddleFinger, is_middle_finger),
];

impl Gesture {
    /// The text shown for this gesture.
    pub fn label(self) -> &'static str {
        match self {
            Self::ThumbsUp => "Thumbs up",
            Self::Peace => "Peace",
            Self::MiddleFinger => "Middle finger",
        }
    }

    /// Checks this gesture's rule on its own, ignoring higher-priority rules.
    pub fn matches(&self, tips: &FingerTips) -> bool {
        match self {
            Self::ThumbsUp => is_thumbs_up(tips),
            Self::Peace => is_peace(tips),
            Self::MiddleFinger => is_middle_finger(tips),
        }
    }

    /// Draws the label in green near the top-left corner of `target`.
    pub fn draw<I: AsImageViewMut>(&self, target: &mut I) {
        let (x, y) = LABEL_POSITION;
        draw_text(target, x, y, self.label())
            .color(Color::GREEN)
            .align_left()
            .align_baseline();
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The fingertip landmarks of one hand, the only landmarks the rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FingerTips {
    pub thumb: NormalizedLandmark,
    pub index: NormalizedLandmark,
    pub middle: NormalizedLandmark,
    pub ring: NormalizedLandmark,
    pub pinky: NormalizedLandmark,
}

impl FingerTips {
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Self {
        Self {
            thumb: landmarks[LandmarkIdx::ThumbTip],
            index: landmarks[LandmarkIdx::IndexFingerTip],
            middle: landmarks[LandmarkIdx::MiddleFingerTip],
            ring: landmarks[LandmarkIdx::RingFingerTip],
            pinky: landmarks[LandmarkIdx::PinkyTip],
        }
    }
}

/// Classifies the gesture shown by a hand, or returns `None` if no rule matches.
pub fn classify(landmarks: &LandmarkSet) -> Option<Gesture> {
    classify_tips(&FingerTips::from_landmarks(landmarks))
}

/// Like [`classify`], for already extracted fingertips.
pub fn classify_tips(tips: &FingerTips) -> Option<Gesture> {
    RULES
        .iter()
        .find(|(_, rule)| rule(tips))
        .map(|&(gesture, _)| gesture)
}

/// Thumb above the index finger, and to its right.
fn is_thumbs_up(t: &FingerTips) -> bool {
    t.thumb.y < t.index.y && t.thumb.x > t.index.x
}

/// Fingertips descending from index to pinky.
fn is_peace(t: &FingerTips) -> bool {
    t.index.y < t.middle.y && t.middle.y < t.ring.y && t.ring.y < t.pinky.y
}

/// Middle finger above both of its neighbors.
fn is_middle_finger(t: &FingerTips) -> bool {
    t.middle.y < t.index.y && t.middle.y < t.ring.y
}
