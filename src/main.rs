use std::ops::ControlFlow;

use handsign::{
    config::Config,
    frames,
    gesture,
    gui::{self, GuiEvent},
    hand::tracking::HandTracker,
    resolution::Resolution,
    timer::FpsCounter,
    webcam::{Webcam, WebcamOptions},
};

const WINDOW_TITLE: &str = "Hand Gesture Tracker";

fn main() {
    handsign::init_logger!();
    handsign::run(app)
}

fn app() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let mut tracker = HandTracker::load(&config)?;

    let mut options = WebcamOptions::default().resolution(Resolution::VGA).fps(30);
    if let Some(name) = config.webcam_name() {
        options = options.name(name);
    }
    let mut webcam = Webcam::open(options)?;

    let mut fps = FpsCounter::new("handsign");
    frames::run_frames(&mut webcam, |webcam, mut frame| {
        // Check before showing the frame, so that a closed window is not reopened.
        if let Some(event) = gui::poll_events().into_iter().find(GuiEvent::is_quit) {
            log::info!("quitting ({event:?})");
            return Ok(ControlFlow::Break(()));
        }

        frame.flip_horizontal_in_place();

        if let Some(hand) = tracker.track(&frame)? {
            hand.draw(&mut frame);
            let landmarks = hand.normalized(frame.resolution());
            if let Some(gesture) = gesture::classify(&landmarks) {
                log::trace!("{gesture}");
                gesture.draw(&mut frame);
            }
        }

        gui::show_image(WINDOW_TITLE, &frame)?;

        fps.tick_with(webcam.timers().chain(tracker.timers()));
        Ok(ControlFlow::Continue(()))
    })
}
