//! Webcam hand tracking with recognition of a few static hand gestures.
//!
//! Frames come from a V4L2 webcam ([`webcam`]), hands are located with MediaPipe's palm detection
//! and hand landmark networks ([`hand`]), and the fingertip landmarks are classified into a
//! [`gesture::Gesture`]. Results are drawn onto the frame and shown in a window ([`gui`]).
//!
//! # Coordinates
//!
//! Image coordinates have their origin in the top-left corner, with X pointing right and Y
//! pointing *down*. Landmark positions are in pixels until they are normalized with
//! [`hand::landmark::LandmarkResult::normalized`], which maps the frame to `0.0..=1.0`.
//!
//! # Environment Variables
//!
//! * `HANDSIGN_MODEL_DIR`: directory containing the ONNX models. Defaults to `3rdparty/onnx` in
//!   the crate root.
//! * `HANDSIGN_MODEL_VARIANT`: `full` (the default) or `lite`.
//! * `HANDSIGN_WEBCAM_NAME`: opens the webcam with this card name instead of `/dev/video0`.
//! * `RUST_LOG`: overrides the log filter set up by [`init_logger!`].
//!
//! See [`config`] for details.

use log::LevelFilter;

pub mod config;
pub mod detection;
pub mod frames;
pub mod gesture;
pub mod gui;
pub mod hand;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod resolution;
pub mod termination;
pub mod timer;
pub mod webcam;

pub use gui::run;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level, `wgpu` at *warn* level. `RUST_LOG`
/// takes precedence over both.
///
/// If a global logger is already registered, this macro does nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
