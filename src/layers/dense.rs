use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::{softmax, ActivationFunction};
use crate::error::{BrainScanError, Result};
use crate::math::{Matrix, Shape, Tensor};

/// Fully connected layer over a flat feature vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub units: usize,
    pub weights: Matrix, // (inputs, units)
    pub biases: Matrix,  // (1, units)
    pub activator: ActivationFunction,
    /// L2 penalty coefficient on the weights (0 disables it).
    #[serde(default)]
    pub l2: f64,
    #[serde(skip)]
    input: Matrix,
    #[serde(skip)]
    pre_neurons: Matrix, // z = xW + b, needed for the activation derivative
    #[serde(skip)]
    weights_grad: Matrix,
    #[serde(skip)]
    biases_grad: Matrix,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(
        units: usize,
        input_size: usize,
        activation: ActivationFunction,
        l2: f64,
        rng: &mut R,
    ) -> Dense {
        let weights = if activation.prefers_he_init() {
            Matrix::he(input_size, units, input_size, rng)
        } else {
            Matrix::xavier(input_size, units, input_size, rng)
        };
        Dense {
            units,
            weights,
            biases: Matrix::zeros(1, units),
            activator: activation,
            l2,
            input: Matrix::default(),
            pre_neurons: Matrix::default(),
            weights_grad: Matrix::default(),
            biases_grad: Matrix::default(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn output_shape(&self, input: &Shape) -> Result<Shape> {
        if input.len() != self.input_size() {
            return Err(BrainScanError::Shape(format!(
                "dense layer expects {} inputs, got {} ({})",
                self.input_size(),
                input.len(),
                input
            )));
        }
        Ok(Shape::flat(self.units))
    }

    pub fn forward(&mut self, input: Tensor) -> Result<Tensor> {
        self.output_shape(&input.shape)?;
        let x = Matrix::row(input.data);
        let z = &(&x * &self.weights) + &self.biases;
        let a = match self.activator {
            ActivationFunction::Softmax => softmax(&z.data),
            act => z.data.iter().map(|&v| act.function(v)).collect(),
        };
        self.input = x;
        self.pre_neurons = z;
        Ok(Tensor::flat(a))
    }

    /// Accumulates parameter gradients and returns ∂L/∂input.
    /// `grad_output` is ∂L/∂a for this layer.
    pub fn backward(&mut self, grad_output: &Tensor) -> Tensor {
        self.ensure_grads();
        let act_derivative = self.pre_neurons.map(|z| self.activator.derivative(z));
        // δ = error ⊙ σ'(z)
        let delta = Matrix::row(grad_output.data.clone()).hadamard(&act_derivative);

        self.weights_grad.accumulate(&(&self.input.transpose() * &delta));
        self.biases_grad.accumulate(&delta);

        let grad_input = &delta * &self.weights.transpose();
        Tensor::flat(grad_input.data)
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

    /// `(value, gradient, l2)` triples for the optimizer.
    pub fn parameters(&mut self) -> Vec<(&mut Matrix, &Matrix, f64)> {
        self.ensure_grads();
        vec![
            (&mut self.weights, &self.weights_grad, self.l2),
            (&mut self.biases, &self.biases_grad, 0.0),
        ]
    }

    pub fn l2_penalty(&self) -> f64 {
        if self.l2 > 0.0 { self.l2 * self.weights.sum_of_squares() } else { 0.0 }
    }
}
