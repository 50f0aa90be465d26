use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::Tensor;

/// Inverted dropout: in training, zeroes each unit with probability `rate`
/// and scales survivors by `1 / (1 - rate)`; identity at inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dropout {
    pub rate: f64,
    #[serde(skip)]
    mask: Option<Vec<f64>>,
}

impl Dropout {
    pub fn new(rate: f64) -> Dropout {
        Dropout { rate, mask: None }
    }

    /// `rng` is `Some` only in training mode.
    pub fn forward<R: Rng + ?Sized>(&mut self, input: Tensor, rng: Option<&mut R>) -> Tensor {
        let Some(rng) = rng.filter(|_| self.rate > 0.0) else {
            self.mask = None;
            return input;
        };
        let keep = 1.0 - self.rate;
        let mask: Vec<f64> = (0..input.data.len())
            .map(|_| if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 })
            .collect();
        let data = input.data.iter().zip(&mask).map(|(x, m)| x * m).collect();
        self.mask = Some(mask);
        Tensor { shape: input.shape, data }
    }

    pub fn backward(&self, grad_output: &Tensor) -> Tensor {
        match &self.mask {
            Some(mask) => Tensor {
                shape: grad_output.shape,
                data: grad_output.data.iter().zip(mask).map(|(g, m)| g * m).collect(),
            },
            None => grad_output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn is_identity_without_rng() {
        let mut d = Dropout::new(0.5);
        let x = Tensor::flat(vec![1.0, 2.0, 3.0]);
        assert_eq!(d.forward::<ChaCha8Rng>(x.clone(), None), x);
    }

    #[test]
    fn training_mask_zeroes_or_rescales() {
        let mut d = Dropout::new(0.25);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let y = d.forward(Tensor::flat(vec![1.0; 200]), Some(&mut rng));
        assert!(y.data.iter().all(|&v| v == 0.0 || (v - 1.0 / 0.75).abs() < 1e-12));
        let dropped = y.data.iter().filter(|&&v| v == 0.0).count();
        assert!(dropped > 20 && dropped < 80);
        let g = d.backward(&Tensor::flat(vec![1.0; 200]));
        assert_eq!(g.data, y.data);
    }
}
