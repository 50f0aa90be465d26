pub mod conv2d;
pub mod dense;
pub mod dropout;
pub mod pool;

pub use conv2d::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use pool::{GlobalMaxPool, MaxPool2d};

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{BrainScanError, Result};
use crate::math::{Matrix, Shape, Tensor};

/// One stage of a sequential network.
///
/// Serialized with an internal `type` tag so model artifacts stay readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    GlobalMaxPool(GlobalMaxPool),
    Dropout(Dropout),
    Flatten {
        #[serde(skip)]
        input_shape: Option<Shape>,
    },
    Dense(Dense),
}

impl Layer {
    pub fn flatten() -> Layer {
        Layer::Flatten { input_shape: None }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Conv2d(_) => "conv2d",
            Layer::MaxPool2d(_) => "max_pool2d",
            Layer::GlobalMaxPool(_) => "global_max_pool",
            Layer::Dropout(_) => "dropout",
            Layer::Flatten { .. } => "flatten",
            Layer::Dense(_) => "dense",
        }
    }

    /// Layers that turn a spatial volume into a feature vector end the
    /// feature-extraction part of a network.
    pub fn is_head(&self) -> bool {
        matches!(self, Layer::Flatten { .. } | Layer::Dense(_) | Layer::GlobalMaxPool(_))
    }

    pub fn output_shape(&self, input: &Shape) -> Result<Shape> {
        match self {
            Layer::Conv2d(l) => l.output_shape(input),
            Layer::MaxPool2d(l) => l.output_shape(input),
            Layer::GlobalMaxPool(l) => l.output_shape(input),
            Layer::Dropout(_) => Ok(*input),
            Layer::Flatten { .. } => Ok(Shape::flat(input.len())),
            Layer::Dense(l) => l.output_shape(input),
        }
    }

    /// `rng` is `Some` in training mode (enables dropout).
    pub fn forward(&mut self, input: Tensor, rng: Option<&mut ChaCha8Rng>) -> Result<Tensor> {
        match self {
            Layer::Conv2d(l) => l.forward(input),
            Layer::MaxPool2d(l) => l.forward(input),
            Layer::GlobalMaxPool(l) => l.forward(input),
            Layer::Dropout(l) => Ok(l.forward(input, rng)),
            Layer::Flatten { input_shape } => {
                *input_shape = Some(input.shape);
                let len = input.shape.len();
                input.reshaped(Shape::flat(len))
            }
            Layer::Dense(l) => l.forward(input),
        }
    }

    /// Accumulates parameter gradients and returns the gradient w.r.t. the
    /// layer input.
    pub fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        match self {
            Layer::Conv2d(l) => l.backward(grad_output),
            Layer::MaxPool2d(l) => l.backward(grad_output),
            Layer::GlobalMaxPool(l) => l.backward(grad_output),
            Layer::Dropout(l) => Ok(l.backward(grad_output)),
            Layer::Flatten { input_shape } => {
                let shape = input_shape.ok_or_else(|| {
                    BrainScanError::Shape("flatten backward called before forward".into())
                })?;
                grad_output.clone().reshaped(shape)
            }
            Layer::Dense(l) => Ok(l.backward(grad_output)),
        }
    }

    pub fn zero_grad(&mut self) {
        match self {
            Layer::Conv2d(l) => l.zero_grad(),
            Layer::Dense(l) => l.zero_grad(),
            _ => {}
        }
    }

    /// `(value, gradient, l2)` for every trainable matrix of the layer.
    pub fn parameters(&mut self) -> Vec<(&mut Matrix, &Matrix, f64)> {
        match self {
            Layer::Conv2d(l) => l.parameters(),
            Layer::Dense(l) => l.parameters(),
            _ => Vec::new(),
        }
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            Layer::Conv2d(l) => l.weights.data.len() + l.biases.data.len(),
            Layer::Dense(l) => l.weights.data.len() + l.biases.data.len(),
            _ => 0,
        }
    }

    pub fn l2_penalty(&self) -> f64 {
        match self {
            Layer::Dense(l) => l.l2_penalty(),
            _ => 0.0,
        }
    }
}
