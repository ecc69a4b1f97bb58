//! The per-frame loop.

use std::ops::ControlFlow;

use crate::image::Image;

/// Produces camera frames, one per call.
pub trait FrameSource {
    /// Blocks until the next frame is available.
    ///
    /// An error means that no further frames can be read.
    fn read(&mut self) -> anyhow::Result<Image>;
}

/// Reads frames from `source` and passes each to `on_frame`, until `on_frame` breaks or fails.
///
/// `on_frame` also gets shared access to the source, for example to report its timers.
///
/// A failure to read a frame ends the loop successfully, after logging it. Errors returned by
/// `on_frame` are propagated.
pub fn run_frames<S, F>(source: &mut S, mut on_frame: F) -> anyhow::Result<()>
where
    S: FrameSource,
    F: FnMut(&S, Image) -> anyhow::Result<ControlFlow<()>>,
{
    loop {
        let frame = match source.read() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("failed to read frame, exiting: {e:#}");
                return Ok(());
            }
        };

        if on_frame(&*source, frame)?.is_break() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    /// Yields `frames` blank frames, then fails.
    struct Countdown {
        frames: u32,
        reads: u32,
    }

    impl Countdown {
        fn new(frames: u32) -> Self {
            Self { frames, reads: 0 }
        }
    }

    impl FrameSource for Countdown {
        fn read(&mut self) -> anyhow::Result<Image> {
            self.reads += 1;
            if self.frames == 0 {
                return Err(anyhow!("device unplugged"));
            }
            self.frames -= 1;
            Ok(Image::new(4, 3))
        }
    }

    #[test]
    fn read_failure_ends_loop() {
        let mut source = Countdown::new(3);
        let mut seen = 0;
        run_frames(&mut source, |_, frame| {
            assert_eq!(frame.width(), 4);
            seen += 1;
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();
        assert_eq!(seen, 3);
        assert_eq!(source.reads, 4);
    }

    #[test]
    fn immediate_read_failure() {
        let mut source = Countdown::new(0);
        run_frames(&mut source, |_, _| -> anyhow::Result<ControlFlow<()>> {
            panic!("no frame should be processed")
        })
        .unwrap();
    }

    #[test]
    fn break_stops_reading() {
        let mut source = Countdown::new(10);
        run_frames(&mut source, |src, _| {
            Ok(if src.reads == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })
        .unwrap();
        assert_eq!(source.reads, 2);
    }

    #[test]
    fn frame_errors_propagate() {
        let mut source = Countdown::new(10);
        let err = run_frames(&mut source, |_, _| Err(anyhow!("GUI thread gone"))).unwrap_err();
        assert_eq!(err.to_string(), "GUI thread gone");
        assert_eq!(source.reads, 1);
    }
}
