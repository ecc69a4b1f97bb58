//! N-dimensional `f32` arrays passed into and out of the networks.

use std::fmt;

use tinyvec::TinyVec;

use crate::iter::zip_exact;

/// Shape followed by strides, stored inline for up to 4 dimensions.
#[derive(Clone)]
struct Layout(TinyVec<[usize; 8]>);

impl Layout {
    fn from_shape(shape: &[usize]) -> Self {
        let mut strides = vec![0; shape.len()];
        let mut stride = 1;
        for (out, &size) in zip_exact(strides.iter_mut().rev(), shape.iter().rev()) {
            *out = stride;
            stride *= size;
        }

        let mut vec = TinyVec::with_capacity(shape.len() * 2);
        vec.extend_from_slice(shape);
        vec.extend_from_slice(&strides);
        Self(vec)
    }

    fn rank(&self) -> usize {
        self.0.len() / 2
    }

    fn shape(&self) -> &[usize] {
        &self.0[..self.rank()]
    }

    fn strides(&self) -> &[usize] {
        &self.0[self.rank()..]
    }

    fn elements(&self) -> usize {
        self.shape().iter().product()
    }

    /// Drops the `n` outermost dimensions.
    fn strip_outer(&self, n: usize) -> Layout {
        let mut vec = TinyVec::with_capacity((self.rank() - n) * 2);
        vec.extend_from_slice(&self.shape()[n..]);
        vec.extend_from_slice(&self.strides()[n..]);
        Layout(vec)
    }

    /// Narrows `data` down to the element range addressed by the index prefix `indices`.
    #[track_caller]
    fn slice<'a>(&self, data: &'a [f32], indices: &[usize]) -> &'a [f32] {
        assert!(
            indices.len() <= self.rank(),
            "cannot index tensor of shape {:?} with {:?}",
            self.shape(),
            indices
        );

        let mut data = data;
        for ((&size, &stride), &index) in self.shape().iter().zip(self.strides()).zip(indices) {
            assert!(
                index < size,
                "index {:?} out of bounds for tensor of shape {:?}",
                indices,
                self.shape()
            );
            data = &data[index * stride..(index + 1) * stride];
        }
        data
    }
}

/// An owned tensor.
///
/// Values are accessed by [`Tensor::index`]ing a prefix of the dimensions, which yields a
/// [`TensorView`] of the remaining ones, and then calling [`TensorView::as_slice`] (one dimension
/// left) or [`TensorView::as_singular`] (none left).
#[derive(Clone)]
pub struct Tensor {
    layout: Layout,
    data: Box<[f32]>,
}

/// A borrowed part of a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    layout: Layout,
    data: &'a [f32],
}

impl Tensor {
    /// Creates a tensor by calling `f` with every index, in row-major order.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let layout = Layout::from_shape(&shape);
        let mut data = Vec::with_capacity(layout.elements());
        if layout.elements() != 0 {
            let mut index = [0; N];
            'outer: loop {
                data.push(f(index));
                for dim in (0..N).rev() {
                    index[dim] += 1;
                    if index[dim] < shape[dim] {
                        continue 'outer;
                    }
                    index[dim] = 0;
                }
                break;
            }
        }

        Self {
            layout,
            data: data.into_boxed_slice(),
        }
    }

    /// Creates a tensor of the given shape from a row-major iterator of values.
    ///
    /// # Panics
    ///
    /// Panics if `iter` does not yield exactly as many values as `shape` requires.
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let layout = Layout::from_shape(shape);
        let data: Box<[f32]> = iter.into_iter().collect();
        assert_eq!(
            data.len(),
            layout.elements(),
            "wrong element count for tensor of shape {shape:?}"
        );
        Self { layout, data }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        let values = tract.as_slice::<f32>()?;
        Ok(Self::from_iter(tract.shape(), values.iter().copied()))
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        Ok(tract_onnx::prelude::Tensor::from_shape(
            self.shape(),
            &self.data,
        )?)
    }

    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    /// Indexes the `N` outermost dimensions, returning a view of the remaining ones.
    ///
    /// # Panics
    ///
    /// Panics if `N` exceeds the rank, or if an index is out of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        TensorView {
            data: self.layout.slice(&self.data, &indices),
            layout: self.layout.strip_outer(N),
        }
    }

    /// Iterates over the outermost dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        assert!(self.rank() > 0, "cannot iterate over a 0-dimensional tensor");
        (0..self.shape()[0]).map(|i| self.index([i]))
    }

    /// # Panics
    ///
    /// Panics unless `self` has exactly one dimension.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(self.rank(), 1, "tensor of shape {:?} is not 1D", self.shape());
        &self.data
    }

    /// # Panics
    ///
    /// Panics unless `self` has zero dimensions.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(self.rank(), 0, "tensor of shape {:?} is not 0D", self.shape());
        self.data[0]
    }
}

impl From<f32> for Tensor {
    fn from(value: f32) -> Self {
        Tensor::from_array_shape_fn([], |[]| value)
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Tensor::from_iter(&[N], arr)
    }
}

impl<'d> TensorView<'d> {
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'d> {
        TensorView {
            data: self.layout.slice(self.data, &indices),
            layout: self.layout.strip_outer(N),
        }
    }

    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'d>> + '_ {
        assert!(self.rank() > 0, "cannot iterate over a 0-dimensional view");
        (0..self.shape()[0]).map(|i| self.index([i]))
    }

    #[track_caller]
    pub fn as_slice(&self) -> &'d [f32] {
        assert_eq!(self.rank(), 1, "view of shape {:?} is not 1D", self.shape());
        self.data
    }

    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(self.rank(), 0, "view of shape {:?} is not 0D", self.shape());
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .finish()
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("shape", &self.shape())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALAR: &[usize] = &[];

    #[test]
    fn shape_fn_order() {
        let mut seen = Vec::new();
        let tensor = Tensor::from_array_shape_fn([1, 2, 3], |index| {
            seen.push(index);
            seen.len() as f32
        });
        assert_eq!(
            seen,
            [
                [0, 0, 0],
                [0, 0, 1],
                [0, 0, 2],
                [0, 1, 0],
                [0, 1, 1],
                [0, 1, 2],
            ]
        );
        assert_eq!(tensor.shape(), [1, 2, 3]);
        assert_eq!(tensor.index([0, 1]).as_slice(), [4.0, 5.0, 6.0]);
    }

    #[test]
    fn empty_dimension() {
        let tensor = Tensor::from_array_shape_fn([1, 0, 3], |idx| unreachable!("{idx:?}"));
        assert_eq!(tensor.iter().count(), 1);
        assert_eq!(tensor.index([0]).iter().count(), 0);
    }

    #[test]
    fn scalar() {
        let tensor = Tensor::from(0.25);
        assert_eq!(tensor.shape(), SCALAR);
        assert_eq!(tensor.as_singular(), 0.25);
        assert_eq!(tensor.index([]).as_singular(), 0.25);
    }

    /// Mimics the `[1, 63]` screen landmark output of the hand landmark network.
    #[test]
    fn landmark_rows() {
        let tensor = Tensor::from_iter(&[1, 63], (0..63).map(|i| i as f32));
        let row = tensor.index([0]);
        assert_eq!(row.shape(), [63]);

        let points: Vec<&[f32]> = row.as_slice().chunks(3).collect();
        assert_eq!(points.len(), 21);
        assert_eq!(points[4], [12.0, 13.0, 14.0]);
        assert_eq!(tensor.index([0, 62]).as_singular(), 62.0);
    }

    /// Mimics the `[1, 2016, 18]` box output of the palm detector.
    #[test]
    fn iterate_boxes() {
        let tensor = Tensor::from_array_shape_fn([1, 2016, 18], |[_, b, c]| (b * 100 + c) as f32);
        let boxes = tensor.index([0]);
        assert_eq!(boxes.iter().count(), 2016);
        let last = boxes.iter().last().unwrap();
        assert_eq!(last.as_slice()[17], 201517.0);
    }

    #[test]
    #[should_panic = "out of bounds"]
    fn index_out_of_bounds() {
        Tensor::from([1.0, 2.0]).index([2]);
    }

    #[test]
    #[should_panic = "wrong element count"]
    fn from_iter_too_short() {
        Tensor::from_iter(&[2, 2], [1.0, 2.0, 3.0]);
    }
}
