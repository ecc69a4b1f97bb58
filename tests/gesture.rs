use handsign::{
    gesture::{self, FingerTips, Gesture},
    hand::landmark::{LandmarkIdx, LandmarkSet, NormalizedLandmark},
};

fn hand(tips: [(f32, f32); 5]) -> LandmarkSet {
    // Put the remaining landmarks somewhere that would match a different gesture.
    let mut set = LandmarkSet([NormalizedLandmark::new(0.5, 0.9); 21]);
    let idx = [
        LandmarkIdx::ThumbTip,
        LandmarkIdx::IndexFingerTip,
        LandmarkIdx::MiddleFingerTip,
        LandmarkIdx::RingFingerTip,
        LandmarkIdx::PinkyTip,
    ];
    for (idx, (x, y)) in idx.into_iter().zip(tips) {
        set[idx] = NormalizedLandmark::new(x, y);
    }
    set
}

#[test]
fn thumbs_up_takes_priority() {
    let set = hand([(0.9, 0.1), (0.1, 0.2), (0.5, 0.3), (0.5, 0.4), (0.5, 0.5)]);
    assert_eq!(gesture::classify(&set), Some(Gesture::ThumbsUp));
    assert_eq!(gesture::classify(&set).unwrap().to_string(), "Thumbs up");
}

#[test]
fn peace() {
    let set = hand([(0.1, 0.9), (0.5, 0.1), (0.5, 0.2), (0.5, 0.3), (0.5, 0.4)]);
    assert_eq!(gesture::classify(&set), Some(Gesture::Peace));
}

#[test]
fn middle_finger() {
    let set = hand([(0.1, 0.9), (0.5, 0.3), (0.5, 0.1), (0.5, 0.3), (0.5, 0.6)]);
    assert_eq!(gesture::classify(&set), Some(Gesture::MiddleFinger));
}

#[test]
fn level_hand_is_unrecognized() {
    let set = hand([(0.2, 0.5), (0.6, 0.5), (0.5, 0.5), (0.5, 0.5), (0.5, 0.5)]);
    assert_eq!(gesture::classify(&set), None);
}

#[test]
fn classify_tips_agrees_with_classify() {
    let set = hand([(0.3, 0.7), (0.4, 0.2), (0.5, 0.25), (0.6, 0.3), (0.7, 0.35)]);
    let tips = FingerTips::from_landmarks(&set);
    assert_eq!(tips.index, NormalizedLandmark::new(0.4, 0.2));
    assert_eq!(gesture::classify_tips(&tips), gesture::classify(&set));
    assert_eq!(gesture::classify(&set), Some(Gesture::Peace));
}

#[test]
fn tips_outside_of_frame_still_classify() {
    // Thumb and index finger raised above the top edge of the frame.
    let set = hand([(0.625, -0.0625), (0.47, -0.02), (0.5, 0.4), (0.5, 0.4), (0.5, 0.4)]);
    assert_eq!(gesture::classify(&set), Some(Gesture::ThumbsUp));

    // Fingers pointing down, out through the bottom edge.
    let set = hand([(0.1, 1.5), (0.5, 1.1), (0.5, 1.2), (0.5, 1.3), (0.5, 1.4)]);
    assert_eq!(gesture::classify(&set), Some(Gesture::Peace));
}
