//! Overlay drawing, implemented on top of `embedded-graphics`.
//!
//! [`draw_line`] and [`draw_text`] return a guard that can be used to customize the shape. The
//! shape is drawn when the guard is dropped, so `draw_line(&mut img, ..).color(c);` draws
//! immediately.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use crate::image::{AsImageViewMut, Color, ImageViewMut};

/// Guard returned by [`draw_line`].
pub struct DrawLine<'a> {
    image: ImageViewMut<'a>,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the stroke width in pixels (default 1).
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        infallible(
            Line::new(self.start, self.end)
                .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width))
                .draw(&mut Target(self.image.reborrow())),
        );
    }
}

/// Guard returned by [`draw_text`].
pub struct DrawText<'a> {
    image: ImageViewMut<'a>,
    position: Point,
    text: &'a str,
    color: Color,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Anchors the text at its left edge instead of its center.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }

    /// Puts the text's alphabetic baseline on the `y` coordinate (like OpenCV's `putText`).
    pub fn align_baseline(&mut self) -> &mut Self {
        self.baseline = Baseline::Alphabetic;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let character_style = MonoTextStyle::new(&FONT_10X20, self.color);
        let text_style = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        let text = Text::with_text_style(self.text, self.position, character_style, text_style);
        infallible(text.draw(&mut Target(self.image.reborrow())).map(drop));
    }
}

/// Side length of the square drawn by [`draw_marker`].
const MARKER_SIZE: u32 = 5;

/// Draws a small red square centered on `(x, y)`, visible on top of skeleton lines.
pub fn draw_marker<I: AsImageViewMut>(image: &mut I, x: i32, y: i32) {
    let half = (MARKER_SIZE / 2) as i32;
    let square = Rectangle::new(
        Point::new(x - half, y - half),
        Size::new(MARKER_SIZE, MARKER_SIZE),
    );
    infallible(
        square
            .into_styled(PrimitiveStyle::with_fill(Color::RED))
            .draw(&mut Target(image.as_view_mut())),
    );
}

/// Draws a line between two points. White by default.
pub fn draw_line<I: AsImageViewMut>(
    image: &mut I,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> DrawLine<'_> {
    DrawLine {
        image: image.as_view_mut(),
        start: Point::new(start_x, start_y),
        end: Point::new(end_x, end_y),
        color: Color::WHITE,
        stroke_width: 1,
    }
}

/// Draws `text`. By default it is centered on `(x, y)` and red.
pub fn draw_text<'a, I: AsImageViewMut>(
    image: &'a mut I,
    x: i32,
    y: i32,
    text: &'a str,
) -> DrawText<'a> {
    DrawText {
        image: image.as_view_mut(),
        position: Point::new(x, y),
        text,
        color: Color::RED,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

fn infallible(res: Result<(), Infallible>) {
    match res {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

struct Target<'a>(ImageViewMut<'a>);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.0.width(), self.0.height()))
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = (self.0.width(), self.0.height());
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) {
                if x < width && y < height {
                    self.0.set(x, y, color);
                }
            }
        }
        Ok(())
    }
}
