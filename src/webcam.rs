//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::{cmp::Reverse, path::PathBuf};

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{frames::FrameSource, image::Image, resolution::Resolution, timer::Timer};

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the maximum resolution at the
/// desired frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Selects the device to open and its format.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    index: u32,
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Sets the index of the device to open (`/dev/video{index}`). Defaults to 0.
    ///
    /// Ignored when a [name](Self::name) is set.
    pub fn index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// Opens the device whose card name is `name` instead of going by index.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the desired minimum image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver it.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired minimum frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver it.
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to prefer a higher resolution or frame rate.
    ///
    /// When the camera cannot deliver both, this controls which one is kept. When it can, this
    /// controls which one is maximized.
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }

    fn device_path(&self) -> PathBuf {
        PathBuf::from(format!("/dev/video{}", self.index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.frame_interval.as_f32()
    }
}

fn negotiate_format(device: &Device, prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("device does not support JPEG or MJPG capture");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                formats.extend(intervals.iter().map(|rate| FrameFormat {
                    resolution: Resolution::new(size.width(), size.height()),
                    frame_interval: *rate.fract(),
                }));
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    let Some(fmt) = select_format(&formats, prefs) else {
        bail!("failed to negotiate a webcam format ({} candidates)", formats.len());
    };
    Ok((
        PixFormat::new(
            fmt.resolution.width(),
            fmt.resolution.height(),
            pixel_format,
        ),
        fmt.frame_interval,
    ))
}

/// Picks the best format for `prefs`, dropping the less preferred constraint first (and then the
/// other) when nothing satisfies them.
fn select_format(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(fmt) = select_format_step(formats, prefs) {
            return Some(fmt);
        }

        log::debug!("no format matches {prefs:?}");
        let relaxed = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !relaxed {
            return None;
        }
    }
}

fn select_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs
                .fps
                .map_or(true, |fps| fmt.fps().round() >= fps as f32)
        })
        .copied()
        .collect::<Vec<_>>();

    // The preferred format ends up last.
    match prefs.pref {
        ParamPreference::Resolution => {
            eligible.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)))
        }
        ParamPreference::Framerate => {
            eligible.sort_by_key(|fmt| (Reverse(fmt.frame_interval), fmt.resolution.num_pixels()))
        }
    }
    eligible.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
///
/// The capture stream is closed when the `Webcam` is dropped.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the webcam selected by `options`.
    ///
    /// This can block for a significant amount of time while the webcam initializes (on the order
    /// of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        match &options.name {
            Some(name) => Self::open_by_name(name, &options),
            None => {
                let path = options.device_path();
                let device = Self::find(|dev| Ok(dev.path()? == path))?
                    .with_context(|| format!("webcam '{}' not found", path.display()))?;
                Self::open_device(device, &options)
            }
        }
    }

    fn open_by_name(name: &str, options: &WebcamOptions) -> anyhow::Result<Self> {
        log::debug!("looking for webcam '{name}'");
        let device = Self::find(|dev| Ok(dev.capabilities()?.card() == name))?
            .with_context(|| format!("no webcam named '{name}' found"))?;
        Self::open_device(device, options)
    }

    /// Returns the first listed device for which `pred` returns `true`.
    fn find<F>(mut pred: F) -> anyhow::Result<Option<Device>>
    where
        F: FnMut(&Device) -> anyhow::Result<bool>,
    {
        for res in linuxvideo::list()? {
            let dev = match res {
                Ok(dev) => dev,
                Err(e) => {
                    log::warn!("{e}");
                    continue;
                }
            };
            match pred(&dev) {
                Ok(true) => return Ok(Some(dev)),
                Ok(false) => {}
                Err(e) => log::debug!("skipping device: {e}"),
            }
        }
        Ok(None)
    }

    fn open_device(dev: Device, options: &WebcamOptions) -> anyhow::Result<Self> {
        let caps = dev.capabilities()?;
        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            bail!("'{}' is not a video capture device", path.display());
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;
        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream(2)?;

        Ok(Self {
            stream,
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        })
    }

    /// The size of the frames this webcam produces.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reads the next frame from the camera, blocking until one is available.
    ///
    /// Frames that fail to decode are replaced with a blank image of the stream size.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let res = self.resolution;
        let t_decode = &self.t_decode;
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let image = t_decode.time(|| Image::decode_jpeg(&buf)).unwrap_or_else(|e| {
                    // Even good webcams occasionally produce corrupted MJPG frames.
                    log::error!("webcam decode error: {e:#}");
                    Image::new(res.width(), res.height())
                });
                Ok(image)
            })
            .context("failed to dequeue webcam frame")
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

impl FrameSource for Webcam {
    fn read(&mut self) -> anyhow::Result<Image> {
        Webcam::read(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: Fract::new(1, fps),
        }
    }

    fn formats() -> Vec<FrameFormat> {
        vec![
            fmt(640, 480, 30),
            fmt(640, 480, 60),
            fmt(1280, 720, 30),
            fmt(1920, 1080, 15),
        ]
    }

    fn prefs(
        resolution: Option<Resolution>,
        fps: Option<u32>,
        pref: ParamPreference,
    ) -> FramePrefs {
        FramePrefs {
            resolution,
            fps,
            pref,
        }
    }

    #[test]
    fn maximizes_preferred_parameter() {
        let formats = formats();
        let by_res = prefs(None, Some(30), ParamPreference::Resolution);
        assert_eq!(select_format(&formats, by_res), Some(fmt(1280, 720, 30)));

        let by_fps = prefs(Some(Resolution::VGA), None, ParamPreference::Framerate);
        assert_eq!(select_format(&formats, by_fps), Some(fmt(640, 480, 60)));

        let anything = FramePrefs::default();
        assert_eq!(select_format(&formats, anything), Some(fmt(1920, 1080, 15)));
    }

    #[test]
    fn relaxes_other_parameter_first() {
        let formats = formats();
        // 1080p@30 isn't available: keep the resolution, give up on the frame rate.
        let by_res = prefs(
            Some(Resolution::new(1920, 1080)),
            Some(30),
            ParamPreference::Resolution,
        );
        assert_eq!(select_format(&formats, by_res), Some(fmt(1920, 1080, 15)));

        // Keep the frame rate, give up on the resolution.
        let by_fps = prefs(
            Some(Resolution::new(1920, 1080)),
            Some(60),
            ParamPreference::Framerate,
        );
        assert_eq!(select_format(&formats, by_fps), Some(fmt(640, 480, 60)));
    }

    #[test]
    fn no_formats() {
        let p = prefs(Some(Resolution::VGA), Some(30), ParamPreference::Resolution);
        assert_eq!(select_format(&[], p), None);
    }

    #[test]
    fn options() {
        let opts = WebcamOptions::default();
        assert_eq!(opts.device_path(), PathBuf::from("/dev/video0"));
        let opts = opts.index(2).fps(30).prefer(ParamPreference::Framerate);
        assert_eq!(opts.device_path(), PathBuf::from("/dev/video2"));
        assert_eq!(opts.frame.fps, Some(30));
        assert_eq!(opts.name("C920").name.as_deref(), Some("C920"));
    }
}
