use serde::{Deserialize, Serialize};

use crate::error::{BrainScanError, Result};
use crate::math::{Shape, Tensor};

/// Non-overlapping max pooling (window = stride = `size`). Trailing rows and
/// columns that do not fill a window are dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxPool2d {
    pub size: usize,
    #[serde(skip)]
    input_shape: Option<Shape>,
    #[serde(skip)]
    argmax: Vec<usize>,
}

impl MaxPool2d {
    pub fn new(size: usize) -> MaxPool2d {
        MaxPool2d { size, input_shape: None, argmax: Vec::new() }
    }

    pub fn output_shape(&self, input: &Shape) -> Result<Shape> {
        if self.size == 0 || input.height < self.size || input.width < self.size {
            return Err(BrainScanError::Shape(format!(
                "cannot max-pool {} with window {}",
                input, self.size
            )));
        }
        Ok(Shape::new(input.channels, input.height / self.size, input.width / self.size))
    }

    pub fn forward(&mut self, input: Tensor) -> Result<Tensor> {
        let out_shape = self.output_shape(&input.shape)?;
        let mut out = Tensor::zeros(out_shape);
        let mut argmax = vec![0usize; out_shape.len()];

        for c in 0..out_shape.channels {
            for oy in 0..out_shape.height {
                for ox in 0..out_shape.width {
                    let mut best = input.offset(c, oy * self.size, ox * self.size);
                    for dy in 0..self.size {
                        for dx in 0..self.size {
                            let idx = input.offset(c, oy * self.size + dy, ox * self.size + dx);
                            if input.data[idx] > input.data[best] {
                                best = idx;
                            }
                        }
                    }
                    let o = out.offset(c, oy, ox);
                    out.data[o] = input.data[best];
                    argmax[o] = best;
                }
            }
        }

        self.input_shape = Some(input.shape);
        self.argmax = argmax;
        Ok(out)
    }

    /// Routes each output gradient back to the input that won its window.
    pub fn backward(&self, grad_output: &Tensor) -> Result<Tensor> {
        route_to_argmax(self.input_shape, &self.argmax, grad_output)
    }
}

/// Per-channel maximum over the whole spatial extent; `(C, H, W) -> (C, 1, 1)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalMaxPool {
    #[serde(skip)]
    input_shape: Option<Shape>,
    #[serde(skip)]
    argmax: Vec<usize>,
}

impl GlobalMaxPool {
    pub fn output_shape(&self, input: &Shape) -> Result<Shape> {
        Ok(Shape::flat(input.channels))
    }

    pub fn forward(&mut self, input: Tensor) -> Result<Tensor> {
        let plane = input.shape.height * input.shape.width;
        if plane == 0 {
            return Err(BrainScanError::Shape(format!("cannot pool empty tensor {}", input.shape)));
        }
        let mut out = Vec::with_capacity(input.shape.channels);
        let mut argmax = Vec::with_capacity(input.shape.channels);
        for c in 0..input.shape.channels {
            let start = c * plane;
            let mut best = start;
            for idx in start..start + plane {
                if input.data[idx] > input.data[best] {
                    best = idx;
                }
            }
            out.push(input.data[best]);
            argmax.push(best);
        }
        self.input_shape = Some(input.shape);
        self.argmax = argmax;
        Ok(Tensor::flat(out))
    }

    pub fn backward(&self, grad_output: &Tensor) -> Result<Tensor> {
        route_to_argmax(self.input_shape, &self.argmax, grad_output)
    }
}

fn route_to_argmax(input_shape: Option<Shape>, argmax: &[usize], grad_output: &Tensor) -> Result<Tensor> {
    let shape = input_shape
        .ok_or_else(|| BrainScanError::Shape("pool backward called before forward".into()))?;
    if grad_output.data.len() != argmax.len() {
        return Err(BrainScanError::Shape(format!(
            "pool gradient has {} values, expected {}",
            grad_output.data.len(),
            argmax.len()
        )));
    }
    let mut grad_input = Tensor::zeros(shape);
    for (g, &idx) in grad_output.data.iter().zip(argmax) {
        grad_input.data[idx] += g;
    }
    Ok(grad_input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_pool_picks_window_maximum_and_routes_gradient() {
        let x = Tensor::from_vec(
            Shape::new(1, 2, 4),
            vec![1.0, 5.0, 2.0, 0.0,
                 3.0, 4.0, 7.0, 6.0],
        )
        .unwrap();
        let mut pool = MaxPool2d::new(2);
        let y = pool.forward(x).unwrap();
        assert_eq!(y.shape, Shape::new(1, 1, 2));
        assert_eq!(y.data, vec![5.0, 7.0]);

        let g = pool.backward(&Tensor::from_vec(Shape::new(1, 1, 2), vec![1.0, 2.0]).unwrap()).unwrap();
        assert_eq!(g.data, vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn odd_sizes_are_floored() {
        let pool = MaxPool2d::new(2);
        assert_eq!(pool.output_shape(&Shape::new(3, 7, 5)).unwrap(), Shape::new(3, 3, 2));
    }

    #[test]
    fn global_max_pool_reduces_each_channel() {
        let x = Tensor::from_vec(Shape::new(2, 1, 3), vec![0.1, 0.9, 0.3, -1.0, -0.5, -2.0]).unwrap();
        let mut pool = GlobalMaxPool::default();
        assert_eq!(pool.forward(x).unwrap().data, vec![0.9, -0.5]);
    }
}
