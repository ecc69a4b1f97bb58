//! Numeric helpers.

use std::cmp::Ordering;

/// An `f32` that is totally ordered via [`f32::total_cmp`], so it can be used as a sort key.
#[derive(Debug, Clone, Copy)]
pub struct TotalF32(pub f32);

impl PartialEq for TotalF32 {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TotalF32 {}

impl PartialOrd for TotalF32 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TotalF32 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// The logistic function. Turns raw network scores into confidences in `0.0..=1.0`.
pub fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn sigmoid_range() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(20.0) > 0.999);
        assert!(sigmoid(-20.0) < 0.001);
    }

    #[test]
    fn total_order() {
        let mut scores = [TotalF32(0.7), TotalF32(-1.0), TotalF32(0.9)];
        scores.sort();
        assert_eq!(scores.map(|s| s.0), [-1.0, 0.7, 0.9]);
        assert_eq!(scores.iter().max(), Some(&TotalF32(0.9)));
    }
}
