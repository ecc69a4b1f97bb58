//! Neural network inference with `tract`.

pub mod tensor;

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::{bail, Context};
use itertools::Itertools;
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use crate::{
    image::{AsImageView, Color, ImageView},
    resolution::Resolution,
};
use tensor::Tensor;

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional network that takes a single RGB image as its input.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Wraps `nn`, checking that its only input is an image tensor laid out as `shape`.
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::input_res_of(&nn, shape)?;
        Ok(Self {
            nn,
            shape,
            input_res,
            color_mapper,
        })
    }

    fn input_res_of(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        let inputs = nn.inputs().collect::<Vec<_>>();
        let [input] = &inputs[..] else {
            bail!("CNN must take exactly 1 input, this one takes {}", inputs.len());
        };

        let (w, h) = match (shape, input.shape()) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            (_, other) => bail!("input shape {other:?} is not a {shape:?} image"),
        };
        Ok(Resolution::new(w.try_into()?, h.try_into()?))
    }

    /// The image size the network was trained on.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on `image`.
    ///
    /// The image is resampled (nearest neighbor) to the input resolution. It is stretched if its
    /// aspect ratio differs, so callers should fit it to the input aspect ratio first.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        let tensor = self.to_tensor(image.as_view());
        self.nn.estimate(&Inputs::from(tensor))
    }

    fn to_tensor(&self, view: ImageView<'_>) -> Tensor {
        let (w, h) = (
            self.input_res.width() as usize,
            self.input_res.height() as usize,
        );
        let sx = view.width() as f32 / w as f32;
        let sy = view.height() as f32 / h as f32;
        let mapper = &self.color_mapper;
        let sample = |x: usize, y: usize| {
            let x = ((x as f32 + 0.5) * sx) as u32;
            let y = ((y as f32 + 0.5) * sy) as u32;
            mapper.map(view.get(x, y))
        };

        match self.shape {
            CnnInputShape::NCHW => {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| sample(x, y)[c])
            }
            CnnInputShape::NHWC => {
                Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| sample(x, y)[c])
            }
        }
    }
}

/// Maps 8-bit sRGB pixels to network input values.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Maps every channel linearly from `0..=255` to `range`.
    pub fn linear(range: RangeInclusive<f32>) -> Self {
        assert!(range.end() > range.start(), "empty color range {range:?}");
        Self { range }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.range.start();
        let scale = (*self.range.end() - start) / 255.0;
        [color.r(), color.g(), color.b()].map(|c| f32::from(c) * scale + start)
    }
}

/// Order of the dimensions of a CNN's image input.
///
/// `N` is the batch size (always 1 here), `C` the color channels, `H` and `W` height and width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum CnnInputShape {
    /// `[N, C, H, W]`
    NCHW,
    /// `[N, H, W, C]`
    NHWC,
}

/// Loads and optimizes a network. Created by [`NeuralNetwork::from_path`].
pub struct Loader {
    model_data: Vec<u8>,
}

impl Loader {
    /// Parses and optimizes the model.
    ///
    /// Fails if the data is not a valid ONNX model or uses operators `tract` does not support.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*self.model_data)?
            .into_optimized()?;
        let plan = SimplePlan::new(graph)?;
        let nn = NeuralNetwork(Arc::new(plan));

        log::debug!(
            "loaded network: inputs [{}], outputs [{}]",
            nn.inputs()
                .map(|i| format!("{}: {:?}", i.name(), i.shape()))
                .join(", "),
            nn.outputs()
                .map(|o| format!("{}: {:?}", o.name(), o.shape()))
                .join(", "),
        );
        Ok(nn)
    }
}

/// A loaded network. Cloning is cheap and shares the model.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Reads an `.onnx` file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Loader> {
        let path = path.as_ref();
        if path.extension().map_or(true, |ext| ext != "onnx") {
            bail!("'{}' is not an `.onnx` file", path.display());
        }

        let data = std::fs::read(path)
            .with_context(|| format!("failed to read model file '{}'", path.display()))?;
        Ok(Loader { model_data: data })
    }

    pub fn inputs(&self) -> impl Iterator<Item = NodeInfo<'_>> {
        let model = self.0.model();
        model.inputs.iter().filter_map(move |outlet| {
            let fact = model.outlet_fact(*outlet).ok()?;
            Some(NodeInfo {
                name: &model.node(outlet.node).name,
                shape: fact.shape.as_concrete()?,
            })
        })
    }

    pub fn outputs(&self) -> impl Iterator<Item = NodeInfo<'_>> {
        let model = self.0.model();
        model.outputs.iter().filter_map(move |outlet| {
            let fact = model.outlet_fact(*outlet).ok()?;
            Some(NodeInfo {
                name: &model.node(outlet.node).name,
                shape: fact.shape.as_concrete()?,
            })
        })
    }

    /// Runs inference on the CPU.
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let inputs = inputs
            .iter()
            .map(|t| Ok(TValue::from_const(Arc::new(t.to_tract()?))))
            .collect::<anyhow::Result<TVec<_>>>()?;
        let outputs = self.0.run(inputs)?;
        let inner = outputs
            .iter()
            .map(|tract| Tensor::from_tract(tract))
            .collect::<anyhow::Result<_>>()?;
        Ok(Outputs { inner })
    }
}

/// Name and shape of a network input or output.
#[derive(Debug)]
pub struct NodeInfo<'a> {
    name: &'a str,
    shape: &'a [usize],
}

impl NodeInfo<'_> {
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Networks with symbolic (unknown) dimensions are not supported, so this is always concrete.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.shape
    }
}

/// Tensors computed by one inference pass, in network output order.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// Input tensors for [`NeuralNetwork::estimate`], in network input order.
#[derive(Debug)]
pub struct Inputs {
    inner: TVec<Tensor>,
}

impl Inputs {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl From<Tensor> for Inputs {
    fn from(t: Tensor) -> Self {
        Self { inner: tvec![t] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let unit = ColorMapper::linear(0.0..=1.0);
        assert_eq!(unit.map(Color::BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(unit.map(Color::GREEN), [0.0, 1.0, 0.0]);

        let signed = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(signed.map(Color::WHITE), [1.0, 1.0, 1.0]);
        assert_eq!(signed.map(Color::BLACK), [-1.0, -1.0, -1.0]);
    }

    #[test]
    fn rejects_non_onnx_paths() {
        let err = NeuralNetwork::from_path("hand_landmark_full.tflite")
            .err()
            .unwrap();
        assert!(err.to_string().contains("not an `.onnx` file"), "{err}");
    }

    #[test]
    fn missing_model_file() {
        let err = NeuralNetwork::from_path("/nonexistent/palm_detection_full.onnx")
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("failed to read model file"));
    }

    #[test]
    fn garbage_model_fails_to_load() {
        let path = std::env::temp_dir()
            .join(format!("handsign-garbage-{}.onnx", std::process::id()));
        std::fs::write(&path, b"not a protobuf").unwrap();
        let res = NeuralNetwork::from_path(&path).unwrap().load();
        std::fs::remove_file(&path).ok();
        assert!(res.is_err());
    }
}
