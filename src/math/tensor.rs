use serde::{Deserialize, Serialize};

use crate::error::{BrainScanError, Result};

/// Channel-major (C, H, W) dimensions of an activation volume.
///
/// Flat feature vectors use `(n, 1, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape {
    pub fn new(channels: usize, height: usize, width: usize) -> Shape {
        Shape { channels, height, width }
    }

    /// Square RGB image of side `size`.
    pub fn rgb(size: usize) -> Shape {
        Shape::new(3, size, size)
    }

    pub fn flat(len: usize) -> Shape {
        Shape::new(len, 1, 1)
    }

    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

/// Activation volume flowing between layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Shape,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: Shape) -> Tensor {
        Tensor { shape, data: vec![0.0; shape.len()] }
    }

    pub fn from_vec(shape: Shape, data: Vec<f64>) -> Result<Tensor> {
        if data.len() != shape.len() {
            return Err(BrainScanError::Shape(format!(
                "{} values cannot fill a {} tensor",
                data.len(),
                shape
            )));
        }
        Ok(Tensor { shape, data })
    }

    pub fn flat(data: Vec<f64>) -> Tensor {
        Tensor { shape: Shape::flat(data.len()), data }
    }

    #[inline]
    pub fn offset(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.shape.height + y) * self.shape.width + x
    }

    #[inline]
    pub fn at(&self, c: usize, y: usize, x: usize) -> f64 {
        self.data[self.offset(c, y, x)]
    }

    /// Same data, new shape. Lengths must agree.
    pub fn reshaped(self, shape: Shape) -> Result<Tensor> {
        Tensor::from_vec(shape, self.data)
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor { shape: self.shape, data: self.data.iter().map(|&v| f(v)).collect() }
    }

    pub fn hadamard(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.shape, other.shape, "hadamard shape mismatch");
        Tensor {
            shape: self.shape,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a * b).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_channel_major() {
        let t = Tensor::from_vec(Shape::new(2, 2, 3), (0..12).map(f64::from).collect()).unwrap();
        assert_eq!(t.at(0, 0, 2), 2.0);
        assert_eq!(t.at(0, 1, 0), 3.0);
        assert_eq!(t.at(1, 0, 0), 6.0);
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(Tensor::from_vec(Shape::new(1, 2, 2), vec![0.0; 3]).is_err());
    }
}
