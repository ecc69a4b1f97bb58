use std::{cmp, fmt};

use embedded_graphics::{prelude::*, primitives::Rectangle};

use crate::resolution::AspectRatio;

/// An axis-aligned rectangle with integer pixel coordinates.
///
/// Rectangles may extend past the edges of an image, and may have zero width or height.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub(crate) rect: Rectangle,
}

impl Rect {
    #[inline]
    pub fn from_top_left(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            rect: Rectangle::new(Point::new(x, y), Size::new(width, height)),
        }
    }

    /// Creates a rectangle of the given size around a center point.
    pub fn from_center(x_center: i32, y_center: i32, width: u32, height: u32) -> Self {
        Self::from_top_left(
            x_center - (width / 2) as i32,
            y_center - (height / 2) as i32,
            width,
            height,
        )
    }

    /// Creates a rectangle spanning two corners. Both corners are included in the result.
    pub fn from_corners(top_left: (i32, i32), bottom_right: (i32, i32)) -> Self {
        let (x0, y0) = top_left;
        let (x1, y1) = bottom_right;
        assert!(x0 <= x1 && y0 <= y1, "invalid corners {top_left:?} {bottom_right:?}");
        Self::from_top_left(x0, y0, (x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32)
    }

    /// Returns the smallest rectangle containing all `points`, or `None` if there are none.
    pub fn bounding<I: IntoIterator<Item = (i32, i32)>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let (x, y) = points.next()?;
        let (min, max) = points.fold(((x, y), (x, y)), |(min, max), (x, y)| {
            (
                (cmp::min(min.0, x), cmp::min(min.1, y)),
                (cmp::max(max.0, x), cmp::max(max.1, y)),
            )
        });
        Some(Self::from_corners(min, max))
    }

    /// Grows every side by `amount` times the width (left/right) or height (top/bottom).
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        let dx = (self.width() as f32 * amount) as i32;
        let dy = (self.height() as f32 * amount) as i32;
        let width = i64::from(self.width()) + 2 * i64::from(dx);
        let height = i64::from(self.height()) + 2 * i64::from(dy);
        Self::from_top_left(
            self.x() - dx,
            self.y() - dy,
            width.max(0) as u32,
            height.max(0) as u32,
        )
    }

    /// Extends the shorter dimension symmetrically until the rectangle has `aspect`.
    ///
    /// # Panics
    ///
    /// Panics if `self` has a width or height of 0.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        assert!(
            self.width() != 0 && self.height() != 0,
            "cannot fit aspect ratio of empty {self:?}"
        );

        let mut out = *self;
        let width = (self.height() as f32 * aspect.as_f32()).round() as u32;
        if width >= self.width() {
            let grow = width - self.width();
            out.rect.top_left.x -= (grow / 2) as i32;
            out.rect.size.width = width;
        } else {
            let height = (self.width() as f32 / aspect.as_f32()).round() as u32;
            let grow = height - self.height();
            out.rect.top_left.y -= (grow / 2) as i32;
            out.rect.size.height = height;
        }
        out
    }

    #[must_use]
    pub fn move_by(&self, dx: i32, dy: i32) -> Self {
        Self::from_top_left(self.x() + dx, self.y() + dy, self.width(), self.height())
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.rect.top_left.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.rect.top_left.y
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.rect.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.rect.size.height
    }

    fn right(&self) -> i64 {
        i64::from(self.x()) + i64::from(self.width())
    }

    fn bottom(&self) -> i64 {
        i64::from(self.y()) + i64::from(self.height())
    }

    /// Returns the overlapping area of both rectangles, or `None` if they don't overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = cmp::max(self.x(), other.x());
        let y = cmp::max(self.y(), other.y());
        let right = cmp::min(self.right(), other.right());
        let bottom = cmp::min(self.bottom(), other.bottom());
        if right <= i64::from(x) || bottom <= i64::from(y) {
            return None;
        }
        Some(Rect::from_top_left(
            x,
            y,
            (right - i64::from(x)) as u32,
            (bottom - i64::from(y)) as u32,
        ))
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect({},{} {}x{})",
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_inclusive() {
        let rect = Rect::from_corners((2, 3), (2, 3));
        assert_eq!(rect, Rect::from_top_left(2, 3, 1, 1));
        assert_eq!((rect.right(), rect.bottom()), (3, 4));
    }

    #[test]
    fn bounding_landmarks() {
        assert_eq!(Rect::bounding(Vec::new()), None);
        assert_eq!(
            Rect::bounding([(10, 40), (30, 5), (-4, 20)]),
            Some(Rect::from_corners((-4, 5), (30, 40)))
        );
    }

    #[test]
    fn grow() {
        let rect = Rect::from_top_left(0, 0, 10, 20);
        assert_eq!(rect.grow_rel(0.5), Rect::from_top_left(-5, -10, 20, 40));
        assert_eq!(rect.grow_rel(0.0), rect);
        assert_eq!(rect.grow_rel(-1.0).width(), 0);
    }

    #[test]
    fn fit_square() {
        assert_eq!(
            Rect::from_center(50, 50, 40, 100).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(50, 50, 100, 100),
        );
        assert_eq!(
            Rect::from_center(50, 50, 100, 40).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(50, 50, 100, 100),
        );
    }

    #[test]
    fn intersect() {
        let frame = Rect::from_top_left(0, 0, 640, 480);
        let roi = Rect::from_top_left(600, -20, 100, 100);
        let clipped = frame.intersection(&roi).unwrap();
        assert_eq!(clipped, Rect::from_top_left(600, 0, 40, 80));
        assert_eq!(clipped.intersection(&roi), Some(clipped));

        let far = Rect::from_top_left(640, 0, 10, 10);
        assert_eq!(frame.intersection(&far), None);
    }
}
