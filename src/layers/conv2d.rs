use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;
use crate::error::{BrainScanError, Result};
use crate::math::{Matrix, Shape, Tensor};

/// 2-D convolution with stride 1 and "same" zero padding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub in_channels: usize,
    pub filters: usize,
    /// Odd kernel side.
    pub kernel: usize,
    pub weights: Matrix, // (filters, in_channels * kernel * kernel)
    pub biases: Matrix,  // (1, filters)
    pub activator: ActivationFunction,
    #[serde(skip)]
    input: Option<Tensor>,
    #[serde(skip)]
    pre_activation: Option<Tensor>,
    #[serde(skip)]
    weights_grad: Matrix,
    #[serde(skip)]
    biases_grad: Matrix,
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        filters: usize,
        kernel: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Result<Conv2d> {
        if kernel % 2 == 0 {
            return Err(BrainScanError::Architecture(format!(
                "convolution kernel must be odd for same padding, got {}",
                kernel
            )));
        }
        if activation == ActivationFunction::Softmax {
            return Err(BrainScanError::Architecture(
                "softmax is only supported on dense layers".into(),
            ));
        }
        let fan_in = in_channels * kernel * kernel;
        let weights = if activation.prefers_he_init() {
            Matrix::he(filters, fan_in, fan_in, rng)
        } else {
            Matrix::xavier(filters, fan_in, fan_in, rng)
        };
        Ok(Conv2d {
            in_channels,
            filters,
            kernel,
            weights,
            biases: Matrix::zeros(1, filters),
            activator: activation,
            input: None,
            pre_activation: None,
            weights_grad: Matrix::default(),
            biases_grad: Matrix::default(),
        })
    }

    pub fn output_shape(&self, input: &Shape) -> Result<Shape> {
        if input.channels != self.in_channels {
            return Err(BrainScanError::Shape(format!(
                "conv layer expects {} input channels, got {}",
                self.in_channels, input.channels
            )));
        }
        Ok(Shape::new(self.filters, input.height, input.width))
    }

    #[inline]
    fn weight_index(&self, filter: usize, channel: usize, ky: usize, kx: usize) -> usize {
        filter * self.weights.cols + (channel * self.kernel + ky) * self.kernel + kx
    }

    pub fn forward(&mut self, input: Tensor) -> Result<Tensor> {
        let out_shape = self.output_shape(&input.shape)?;
        let (h, w) = (input.shape.height, input.shape.width);
        let pad = self.kernel / 2;
        let mut z = Tensor::zeros(out_shape);

        for o in 0..self.filters {
            let bias = self.biases.data[o];
            for y in 0..h {
                for x in 0..w {
                    let mut sum = bias;
                    for c in 0..self.in_channels {
                        for ky in 0..self.kernel {
                            let Some(iy) = (y + ky).checked_sub(pad).filter(|&iy| iy < h) else {
                                continue;
                            };
                            for kx in 0..self.kernel {
                                let Some(ix) = (x + kx).checked_sub(pad).filter(|&ix| ix < w) else {
                                    continue;
                                };
                                sum += self.weights.data[self.weight_index(o, c, ky, kx)]
                                    * input.at(c, iy, ix);
                            }
                        }
                    }
                    let off = z.offset(o, y, x);
                    z.data[off] = sum;
                }
            }
        }

        let act = self.activator;
        let a = z.map(|v| act.function(v));
        self.input = Some(input);
        self.pre_activation = Some(z);
        Ok(a)
    }

    /// Accumulates kernel/bias gradients and returns ∂L/∂input.
    pub fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor> {
        self.ensure_grads();
        let (Some(input), Some(z)) = (self.input.as_ref(), self.pre_activation.as_ref()) else {
            return Err(BrainScanError::Shape("conv backward called before forward".into()));
        };
        let act = self.activator;
        let delta = grad_output.hadamard(&z.map(|v| act.derivative(v)));

        let (h, w) = (input.shape.height, input.shape.width);
        let pad = self.kernel / 2;
        let mut grad_input = Tensor::zeros(input.shape);

        for o in 0..self.filters {
            for y in 0..h {
                for x in 0..w {
                    let d = delta.at(o, y, x);
                    if d == 0.0 {
                        continue;
                    }
                    self.biases_grad.data[o] += d;
                    for c in 0..self.in_channels {
                        for ky in 0..self.kernel {
                            let Some(iy) = (y + ky).checked_sub(pad).filter(|&iy| iy < h) else {
                                continue;
                            };
                            for kx in 0..self.kernel {
                                let Some(ix) = (x + kx).checked_sub(pad).filter(|&ix| ix < w) else {
                                    continue;
                                };
                                let wi = self.weight_index(o, c, ky, kx);
                                let ii = input.offset(c, iy, ix);
                                self.weights_grad.data[wi] += d * input.data[ii];
                                grad_input.data[ii] += d * self.weights.data[wi];
                            }
                        }
                    }
                }
            }
        }
        Ok(grad_input)
    }

    pub fn zero_grad(&mut self) {
        self.weights_grad = Matrix::zeros(self.weights.rows, self.weights.cols);
        self.biases_grad = Matrix::zeros(self.biases.rows, self.biases.cols);
    }

    fn ensure_grads(&mut self) {
        if !self.weights_grad.is_same_shape(&self.weights) || !self.biases_grad.is_same_shape(&self.biases) {
            self.zero_grad();
        }
    }

    pub fn parameters(&mut self) -> Vec<(&mut Matrix, &Matrix, f64)> {
        self.ensure_grads();
        vec![
            (&mut self.weights, &self.weights_grad, 0.0),
            (&mut self.biases, &self.biases_grad, 0.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn layer() -> Conv2d {
        Conv2d::new(2, 2, 3, ActivationFunction::Identity, &mut ChaCha8Rng::seed_from_u64(3)).unwrap()
    }

    fn input() -> Tensor {
        let data = (0..2 * 4 * 5).map(|i| ((i * 7) % 11) as f64 / 10.0 - 0.5).collect();
        Tensor::from_vec(Shape::new(2, 4, 5), data).unwrap()
    }

    #[test]
    fn keeps_spatial_size() {
        let mut conv = layer();
        let out = conv.forward(input()).unwrap();
        assert_eq!(out.shape, Shape::new(2, 4, 5));
    }

    #[test]
    fn identity_kernel_copies_input() {
        let mut conv = Conv2d::new(1, 1, 3, ActivationFunction::Identity, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        conv.weights.fill(0.0);
        conv.weights.data[4] = 1.0; // centre tap
        let x = Tensor::from_vec(Shape::new(1, 3, 3), (1..=9).map(f64::from).collect()).unwrap();
        let y = conv.forward(x.clone()).unwrap();
        assert_eq!(y.data, x.data);
    }

    #[test]
    fn input_gradient_matches_finite_differences() {
        let mut conv = layer();
        let x = input();
        conv.forward(x.clone()).unwrap();
        let upstream = Tensor::from_vec(
            Shape::new(2, 4, 5),
            (0..40).map(|i| (i % 5) as f64 * 0.1 - 0.2).collect(),
        )
        .unwrap();
        let analytic = conv.backward(&upstream).unwrap();

        let objective = |t: &Tensor| {
            let mut c = layer();
            let out = c.forward(t.clone()).unwrap();
            out.data.iter().zip(&upstream.data).map(|(a, g)| a * g).sum::<f64>()
        };
        let eps = 1e-6;
        for i in [0usize, 7, 13, 22, 39] {
            let mut plus = x.clone();
            plus.data[i] += eps;
            let mut minus = x.clone();
            minus.data[i] -= eps;
            let numeric = (objective(&plus) - objective(&minus)) / (2.0 * eps);
            assert!((numeric - analytic.data[i]).abs() < 1e-6, "index {}", i);
        }
    }

    #[test]
    fn rejects_even_kernels() {
        assert!(Conv2d::new(1, 1, 2, ActivationFunction::ReLU, &mut ChaCha8Rng::seed_from_u64(0)).is_err());
    }
}
