//! Landmark estimation and region-of-interest tracking.
//!
//! A landmark network looks at a crop around one object (here: a hand) and locates a fixed set of
//! points on it. [`Estimator`] runs such a network on an image view and maps the results back into
//! the view's coordinates. [`LandmarkTracker`] feeds the estimator one region of interest per frame
//! and moves that region along with the object, so that the detector only has to run when tracking
//! is lost.

use crate::{
    image::{AsImageView, ImageView, Rect},
    nn::{Cnn, Outputs},
    resolution::{AspectRatio, Resolution},
    timer::Timer,
};

type Position = [f32; 3];

/// A fixed-size list of 3D landmark positions.
#[derive(Debug, Clone)]
pub struct Landmarks {
    positions: Box<[Position]>,
}

impl Landmarks {
    /// Creates `len` landmarks at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; len].into_boxed_slice(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        self.positions.iter().map(|&pos| Landmark { pos })
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions.iter_mut() {
            *pos = f(*pos);
        }
    }
}

/// One landmark, in pixels. The network's depth estimate is not exposed.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark {
    pos: Position,
}

impl Landmark {
    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }
}

/// Result type of a landmark [`Network`].
pub trait Estimate: Send + Sync + 'static {
    fn landmarks(&self) -> &Landmarks;
    fn landmarks_mut(&mut self) -> &mut Landmarks;
}

/// Estimates that report how likely it is that the object is still in view.
pub trait Confidence {
    /// Usually in `0.0..=1.0`. [`LandmarkTracker`] drops its region of interest when this falls
    /// below its loss threshold.
    fn confidence(&self) -> f32;
}

/// A network that locates landmarks.
pub trait Network: Send + Sync + 'static {
    type Output: Estimate;

    fn cnn(&self) -> &Cnn;

    /// Writes the network outputs to `estimate`, with positions in network input pixels.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output);
}

/// Runs a landmark [`Network`], reusing one output buffer across calls.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("landmarks"),
            t_extract: Timer::new("extract"),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    /// Estimates landmarks in `image`, returning positions in `image` coordinates.
    ///
    /// If `image` does not have the network's aspect ratio, a larger view around it is used, which
    /// contains more of the underlying image (or transparent padding at its edges).
    pub fn estimate<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&mut E> {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&mut self, image: ImageView<'_>) -> anyhow::Result<&mut E> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let Some(aspect) = input_res.aspect_ratio() else {
            anyhow::bail!("landmark network has an empty input ({input_res})");
        };

        let rect = image.rect().grow_to_fit_aspect(aspect);
        let view = image.view(rect);
        let outputs = self.t_infer.time(|| cnn.estimate(&view))?;
        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate));

        let scale = rect.width() as f32 / input_res.width() as f32;
        let (dx, dy) = (rect.x() as f32, rect.y() as f32);
        self.estimate
            .landmarks_mut()
            .map_positions(|[x, y, z]| [x * scale + dx, y * scale + dy, z * scale]);

        Ok(&mut self.estimate)
    }
}

/// Follows an object from frame to frame by re-centering a region of interest (RoI) on the
/// landmarks found in the previous frame.
///
/// Tracking has to be seeded with [`LandmarkTracker::set_roi`], typically from a detector.
pub struct LandmarkTracker<E: Estimate + Confidence> {
    estimator: Estimator<E>,
    aspect_ratio: AspectRatio,
    roi: Option<Rect>,
    loss_thresh: f32,
}

impl<E: Estimate + Confidence> LandmarkTracker<E> {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    /// Fraction of the landmarks' bounding box added to each side to get the next RoI.
    pub const ROI_PADDING: f32 = 0.3;

    pub fn new(estimator: Estimator<E>) -> Self {
        Self {
            aspect_ratio: estimator
                .input_resolution()
                .aspect_ratio()
                .unwrap_or(AspectRatio::SQUARE),
            estimator,
            roi: None,
            loss_thresh: Self::DEFAULT_LOSS_THRESHOLD,
        }
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.estimator.timers()
    }

    /// Sets the confidence below which tracking counts as lost.
    pub fn set_loss_threshold(&mut self, threshold: f32) {
        self.loss_thresh = threshold;
    }

    /// The RoI the next call to [`LandmarkTracker::track`] will look at, if any.
    pub fn roi(&self) -> Option<Rect> {
        self.roi
    }

    /// Starts (or restarts) tracking inside `roi`. The rectangle is used without padding.
    pub fn set_roi(&mut self, roi: Rect) {
        self.roi = Some(roi);
    }

    /// Estimates landmarks inside the current RoI of `full_image`.
    ///
    /// Returns `Ok(None)` when there is no RoI, or when the estimate's confidence is below the
    /// loss threshold (which also clears the RoI). Otherwise the RoI moves to the padded bounding
    /// box of the landmarks, and the landmarks are returned in `full_image` coordinates.
    pub fn track<V: AsImageView>(&mut self, full_image: &V) -> anyhow::Result<Option<&E>> {
        self.track_impl(full_image.as_view())
    }

    fn track_impl(&mut self, full_image: ImageView<'_>) -> anyhow::Result<Option<&E>> {
        let Some(roi) = self.roi else {
            return Ok(None);
        };
        if roi.width() == 0 || roi.height() == 0 {
            log::debug!("RoI {roi:?} collapsed, tracking lost");
            self.roi = None;
            return Ok(None);
        }

        let view_rect = roi.grow_to_fit_aspect(self.aspect_ratio);
        let view = full_image.view(view_rect);
        let estimate = self.estimator.estimate(&view)?;
        if estimate.confidence() < self.loss_thresh {
            log::trace!(
                "confidence {} below loss threshold {}, tracking lost",
                estimate.confidence(),
                self.loss_thresh,
            );
            self.roi = None;
            return Ok(None);
        }

        let (dx, dy) = (view_rect.x() as f32, view_rect.y() as f32);
        estimate
            .landmarks_mut()
            .map_positions(|[x, y, z]| [x + dx, y + dy, z]);

        let bounds = Rect::bounding(
            estimate
                .landmarks()
                .iter()
                .map(|lm| (lm.x().round() as i32, lm.y().round() as i32)),
        );
        self.roi = bounds.map(|rect| rect.grow_rel(Self::ROI_PADDING));

        Ok(Some(&*estimate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_access() {
        let mut lms = Landmarks::new(3);
        assert_eq!(lms.positions().len(), 3);
        lms.positions_mut()[1] = [4.0, 5.0, 6.0];
        lms.map_positions(|[x, y, z]| [x + 1.0, y * 2.0, z]);

        assert_eq!(lms.positions()[1], [5.0, 10.0, 6.0]);
        let xy: Vec<_> = lms.iter().map(|lm| (lm.x(), lm.y())).collect();
        assert_eq!(xy, [(1.0, 0.0), (5.0, 10.0), (1.0, 0.0)]);
    }
}
