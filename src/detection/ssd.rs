//! SSD anchor generation.
//!
//! Only what the MediaPipe palm detector needs: every anchor is centered on its feature map cell
//! and has a fixed size, so only the center is stored.

use std::ops::Index;

use crate::resolution::Resolution;

/// Anchor center, in `0.0..=1.0` relative to the network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// An output feature map of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    boxes_per_cell: u32,
    resolution: Resolution,
}

impl LayerInfo {
    /// `boxes_per_cell` anchors are placed on each of the `width x height` cells.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0, "layer needs at least one box per cell");
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// All anchors of a network, in output order.
#[derive(Debug)]
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();
        for layer in layers {
            let (w, h) = (layer.resolution.width(), layer.resolution.height());
            for y in 0..h {
                for x in 0..w {
                    let anchor = Anchor {
                        x_center: (x as f32 + 0.5) / w as f32,
                        y_center: (y as f32 + 0.5) / h as f32,
                    };
                    anchors.extend((0..layer.boxes_per_cell).map(|_| anchor));
                }
            }
        }
        Self { anchors }
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Anchor> {
        self.anchors.iter()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}
