//! Frames, views into frames, and drawing.
//!
//! [`Image`] is the owned RGBA frame type produced by the webcam and consumed by the neural
//! networks and the GUI. [`ImageView`] and [`ImageViewMut`] borrow rectangular parts of an image
//! (for example the region of interest around a tracked hand). Code that only needs pixel access
//! should be generic over [`AsImageView`] or [`AsImageViewMut`].

mod draw;
mod rect;

#[cfg(test)]
mod tests;

use std::fmt;

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{ImageBuffer, Rgba, RgbaImage};

use crate::resolution::Resolution;

pub use draw::*;
pub use rect::*;

/// An owned 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    // RGBA8 so that frames can be uploaded to the GPU without conversion.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Creates a fully transparent black image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Decodes a JFIF JPEG or a Motion-JPEG frame.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        let buf = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8();
        Ok(Self { buf })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the [`Rect`] at `(0, 0)` that covers the whole image.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0, 0, self.width(), self.height())
    }

    #[cfg(test)]
    pub(crate) fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Borrows the area covered by `rect`.
    ///
    /// The view always has the size of `rect`. Parts of it that lie outside of the image read as
    /// [`Color::NULL`] and ignore writes.
    pub fn view(&self, rect: Rect) -> ImageView<'_> {
        ImageView {
            image: self,
            data: ViewData::full(self).view(rect),
        }
    }

    /// Mutably borrows the area covered by `rect`. See [`Image::view`].
    pub fn view_mut(&mut self, rect: Rect) -> ImageViewMut<'_> {
        ImageViewMut {
            data: ViewData::full(self).view(rect),
            image: self,
        }
    }

    /// Mirrors the image, so that it looks like the user's reflection.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Raw RGBA8 data, row by row.
    #[inline]
    pub(crate) fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({})", self.resolution())
    }
}

#[derive(Debug, Clone, Copy)]
struct ViewData {
    /// Area of the view, in coordinates of the underlying [`Image`].
    rect: Rect,
}

impl ViewData {
    fn full(image: &Image) -> Self {
        Self { rect: image.rect() }
    }

    /// Narrows the view to `rect`, which is relative to this view.
    fn view(&self, rect: Rect) -> Self {
        Self {
            rect: rect.move_by(self.rect.x(), self.rect.y()),
        }
    }

    fn rect(&self) -> Rect {
        Rect::from_top_left(0, 0, self.rect.width(), self.rect.height())
    }

    /// Maps view coordinates to image coordinates, or `None` when they are outside the image.
    fn image_coord(&self, x: u32, y: u32, image: &Image) -> Option<(u32, u32)> {
        let x = i64::from(self.rect.x()) + i64::from(x);
        let y = i64::from(self.rect.y()) + i64::from(y);
        let x: u32 = x.try_into().ok()?;
        let y: u32 = y.try_into().ok()?;
        (x < image.width() && y < image.height()).then_some((x, y))
    }

    fn get(&self, x: u32, y: u32, image: &Image) -> Color {
        self.image_coord(x, y, image)
            .map_or(Color::NULL, |(x, y)| Color(image.buf[(x, y)].0))
    }
}

/// An immutable view of a rectangular section of an [`Image`].
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    data: ViewData,
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.data.rect.width()
    }

    pub fn height(&self) -> u32 {
        self.data.rect.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns the [`Rect`] at `(0, 0)` that covers the whole view.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.data.rect()
    }

    /// Returns the color at `(x, y)`, or [`Color::NULL`] if that pixel lies outside the image.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.data.get(x, y, self.image)
    }

    /// Borrows a part of this view. `rect` is relative to the view.
    pub fn view(&self, rect: Rect) -> ImageView<'a> {
        ImageView {
            image: self.image,
            data: self.data.view(rect),
        }
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageView({:?})", self.data.rect)
    }
}

/// A mutable view of a rectangular section of an [`Image`].
pub struct ImageViewMut<'a> {
    image: &'a mut Image,
    data: ViewData,
}

impl<'a> ImageViewMut<'a> {
    pub fn width(&self) -> u32 {
        self.data.rect.width()
    }

    pub fn height(&self) -> u32 {
        self.data.rect.height()
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.data.rect()
    }

    /// Sets the color at `(x, y)`. Pixels outside of the underlying image are left alone.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        if let Some((x, y)) = self.data.image_coord(x, y, self.image) {
            self.image.buf[(x, y)] = Rgba(color.0);
        }
    }

    /// Reborrows `self` with a shorter lifetime, like `&mut *r` does for references.
    pub fn reborrow(&mut self) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            data: self.data,
        }
    }

    pub fn view(&self, rect: Rect) -> ImageView<'_> {
        ImageView {
            image: self.image,
            data: self.data.view(rect),
        }
    }

    pub fn view_mut(&mut self, rect: Rect) -> ImageViewMut<'_> {
        ImageViewMut {
            image: self.image,
            data: self.data.view(rect),
        }
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageViewMut({:?})", self.data.rect)
    }
}

/// An 8-bit sRGB color with non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Transparent black. Returned for pixels outside of an image.
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Types that can be read like an image.
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

/// Types that can be drawn on like an image.
pub trait AsImageViewMut: AsImageView {
    fn as_view_mut(&mut self) -> ImageViewMut<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageViewMut for Image {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.view_mut(self.rect())
    }
}

impl<'a> AsImageView for ImageView<'a> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl<'a> AsImageView for ImageViewMut<'a> {
    fn as_view(&self) -> ImageView<'_> {
        ImageView {
            image: self.image,
            data: self.data,
        }
    }
}

impl<'a> AsImageViewMut for ImageViewMut<'a> {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        self.reborrow()
    }
}

impl<'a, V: AsImageView> AsImageView for &'a V {
    fn as_view(&self) -> ImageView<'_> {
        (*self).as_view()
    }
}

impl<'a, V: AsImageView> AsImageView for &'a mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<'a, V: AsImageViewMut> AsImageViewMut for &'a mut V {
    fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        (*self).as_view_mut()
    }
}
