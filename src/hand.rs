//! Hand detection, landmark estimation and tracking, built on MediaPipe's hand models.
//!
//! [`detection`] finds palms in a full frame, [`landmark`] locates the 21 hand landmarks in a crop
//! around one hand, and [`tracking::HandTracker`] combines both so that the (slower) palm detector
//! only runs when no hand is being followed.

pub mod detection;
pub mod landmark;
pub mod tracking;
