//! Neural Network inference.

use std::{
    fmt,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    sync::Arc,
};

use tract_onnx::prelude::{
    tract_ndarray::Array4, tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec,
    Tensor, TypedFact, TypedOp,
};

use crate::image::{Color, Image, Rect, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`].
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn, shape)?;
        Ok(Self {
            nn,
            shape,
            input_res,
            color_mapper,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        if nn.num_inputs() != 1 {
            anyhow::bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let tensor_shape = nn.input_shape(0)?;
        let (w, h) = match (shape, &*tensor_shape) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => {
                anyhow::bail!(
                    "invalid model input shape for {:?} CNN: {:?}",
                    shape,
                    tensor_shape,
                );
            }
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on the part of `image` covered by `roi`, returning the estimated outputs.
    ///
    /// The region is sampled with nearest-neighbor filtering to create the network's input tensor.
    /// If its aspect ratio does not match the network's input aspect ratio, the region will be
    /// stretched. Parts of `roi` outside of `image` are treated as black.
    pub fn estimate(&self, image: &Image, roi: Rect) -> anyhow::Result<Outputs> {
        let (h, w) = (
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        );

        let pixels = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .map(|(x, y)| {
                let [px, py] = roi.transform_out(x as f32 + 0.5, y as f32 + 0.5, w as f32, h as f32);
                let color = image
                    .get(px.floor() as i64, py.floor() as i64)
                    .unwrap_or(Color::BLACK);
                self.color_mapper.map(color)
            })
            .collect::<Vec<_>>();

        let tensor: Tensor = match self.shape {
            CnnInputShape::NCHW => {
                Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| pixels[y * w + x][c]).into()
            }
            CnnInputShape::NHWC => {
                Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| pixels[y * w + x][c]).into()
            }
        };

        self.nn.estimate(tensor)
    }
}

/// Maps 8-bit sRGB colors to the value range a network expects.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let adjust_range = (end - start) / 255.0;
        let rgb = [color.r(), color.g(), color.b()];
        rgb.map(|col| col as f32 * adjust_range + start)
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, often fixed at 1.
/// - `C` is the number of color channels, often 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive] // shouldn't be matched on by user code
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork {
    model: Arc<Model>,
    path: PathBuf,
}

impl NeuralNetwork {
    /// Loads and optimizes a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension. Returns an error if the file is missing, if the
    /// network data is malformed, or if the network uses unimplemented operations.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let graph = tract_onnx::onnx()
            .model_for_path(path)?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;

        log::debug!("loaded neural network from '{}'", path.display());
        Ok(Self {
            model: Arc::new(model),
            path: path.to_path_buf(),
        })
    }

    /// Returns the path this network was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.model.model().inputs.len()
    }

    fn input_shape(&self, index: usize) -> anyhow::Result<TVec<usize>> {
        let fact = self.model.model().input_fact(index)?;
        match fact.shape.as_concrete() {
            Some(shape) => Ok(shape.into()),
            None => anyhow::bail!("network input {} has a symbolic shape", index),
        }
    }

    /// Runs the network on a single input tensor, returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: Tensor) -> anyhow::Result<Outputs> {
        let outputs = self.model.run(tvec![TValue::from_const(Arc::new(input))])?;
        Ok(Outputs { inner: outputs })
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
pub struct Outputs {
    inner: TVec<TValue>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the data of output tensor `index` as a flat `f32` slice.
    ///
    /// Fails if the network has fewer outputs or if the tensor is not of type `f32`.
    pub fn f32s(&self, index: usize) -> anyhow::Result<&[f32]> {
        let Some(tensor) = self.inner.get(index) else {
            anyhow::bail!(
                "network output {} requested, but only {} outputs exist",
                index,
                self.inner.len()
            );
        };
        Ok(tensor.as_slice::<f32>()?)
    }

    /// Returns the first `f32` value of output tensor `index`.
    pub fn scalar(&self, index: usize) -> anyhow::Result<f32> {
        match self.f32s(index)? {
            [first, ..] => Ok(*first),
            [] => anyhow::bail!("network output {} is empty", index),
        }
    }
}

impl fmt::Debug for Outputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.inner.iter().map(|t| t.shape().to_vec()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn missing_model_is_an_error() {
        let err = NeuralNetwork::from_path("does/not/exist.onnx").err();
        assert!(err.is_some());
        assert!(NeuralNetwork::from_path("model.tflite").is_err());
    }
}
