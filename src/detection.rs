//! Object detection with single-shot detector networks.
//!
//! A [`Detector`] runs a detection [`Network`] on an image, drops low-confidence results, merges
//! duplicates with [`nms::NonMaxSuppression`], and maps everything back into the coordinate system
//! of the input image.

pub mod nms;
pub mod ssd;

use crate::{
    image::{AsImageView, ImageView, Rect},
    nn::{Cnn, Outputs},
    resolution::Resolution,
    timer::Timer,
};

use self::nms::NonMaxSuppression;

/// A network that detects objects in an image.
pub trait Network: Send + Sync + 'static {
    fn cnn(&self) -> &Cnn;

    /// Appends every detection with a confidence of at least `threshold` to `detections`.
    ///
    /// Positions are in the pixel coordinates of the network input.
    fn extract(&self, outputs: &Outputs, threshold: f32, detections: &mut Vec<Detection>);
}

pub struct Detector {
    network: Box<dyn Network>,
    detections: Vec<Detection>,
    thresh: f32,
    nms: NonMaxSuppression,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Vec::new(),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
            t_infer: Timer::new("detect"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Sets the minimum confidence a detection needs to be reported.
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Detects objects in `image`. Positions are returned in `image` coordinates.
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detect_impl(image.as_view())
    }

    fn detect_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let Some(input_aspect) = input_res.aspect_ratio() else {
            anyhow::bail!("detection network has an empty input ({input_res})");
        };

        // Pad the image to the network's aspect ratio instead of stretching it.
        let rect = image.rect().grow_to_fit_aspect(input_aspect);
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;

        self.t_extract.time(|| {
            self.network
                .extract(&outputs, self.thresh, &mut self.detections)
        });
        self.t_nms.time(|| self.nms.process(&mut self.detections));

        let scale = rect.width() as f32 / input_res.width() as f32;
        let (dx, dy) = (rect.x() as f32, rect.y() as f32);
        for det in &mut self.detections {
            det.rect = det.rect.scale_coords(scale).move_by(dx, dy);
            for kp in &mut det.keypoints {
                kp.x = kp.x * scale + dx;
                kp.y = kp.y * scale + dy;
            }
        }

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// A detected object: its bounding box, a confidence in `0.0..=1.0`, and network-specific
/// keypoints.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    rect: BoundingRect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn with_keypoints(confidence: f32, rect: BoundingRect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bounding_rect(&self) -> BoundingRect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }
}

/// A point of interest reported with a [`Detection`], like the wrist of a detected palm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}

/// An axis-aligned rectangle with sub-pixel precision, stored as center and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingRect {
    xc: f32,
    yc: f32,
    w: f32,
    h: f32,
}

impl BoundingRect {
    pub fn from_center(xc: f32, yc: f32, w: f32, h: f32) -> Self {
        Self { xc, yc, w, h }
    }

    pub fn x_center(&self) -> f32 {
        self.xc
    }

    pub fn y_center(&self) -> f32 {
        self.yc
    }

    pub fn width(&self) -> f32 {
        self.w
    }

    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self::from_center(self.xc + dx, self.yc + dy, self.w, self.h)
    }

    /// Multiplies the position and size by `factor`, mapping between coordinate systems.
    #[must_use]
    pub fn scale_coords(&self, factor: f32) -> Self {
        Self::from_center(
            self.xc * factor,
            self.yc * factor,
            self.w * factor,
            self.h * factor,
        )
    }

    /// Returns the area of the overlap between `self` and `other`.
    pub fn intersection_area(&self, other: &Self) -> f32 {
        let overlap = |c1: f32, s1: f32, c2: f32, s2: f32| {
            let lo = (c1 - s1 / 2.0).max(c2 - s2 / 2.0);
            let hi = (c1 + s1 / 2.0).min(c2 + s2 / 2.0);
            (hi - lo).max(0.0)
        };
        overlap(self.xc, self.w, other.xc, other.w) * overlap(self.yc, self.h, other.yc, other.h)
    }

    /// Intersection over union, in `0.0..=1.0`. Returns 0 for two empty rectangles.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Rounds to the nearest integer [`Rect`].
    pub fn to_rect(&self) -> Rect {
        let w = self.w.max(0.0).round() as u32;
        let h = self.h.max(0.0).round() as u32;
        Rect::from_top_left(
            (self.xc - self.w / 2.0).round() as i32,
            (self.yc - self.h / 2.0).round() as i32,
            w,
            h,
        )
    }
}
