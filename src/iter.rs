//! Iterator helpers.

use std::iter::Zip;

/// Like [`Iterator::zip`], but panics instead of silently truncating when the lengths differ.
///
/// Used wherever network outputs are paired with precomputed data (like SSD anchors), since a
/// length mismatch there means the wrong model was loaded.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let (a, b) = (a.into_iter(), b.into_iter());
    assert_eq!(a.len(), b.len(), "`zip_exact` length mismatch");
    a.zip(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_lengths() {
        let pairs: Vec<_> = zip_exact([1, 2], ["a", "b"]).collect();
        assert_eq!(pairs, [(1, "a"), (2, "b")]);
    }

    #[test]
    #[should_panic = "length mismatch"]
    fn different_lengths() {
        let _ = zip_exact([1, 2, 3], [1]);
    }
}
