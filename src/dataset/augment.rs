use rand::Rng;

use crate::math::Tensor;

/// Random brightness scaling: every value is multiplied by one factor drawn
/// uniformly from `[low, high]`, then clamped to [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessJitter {
    pub low: f64,
    pub high: f64,
}

impl Default for BrightnessJitter {
    fn default() -> Self {
        BrightnessJitter { low: 0.8, high: 1.2 }
    }
}

impl BrightnessJitter {
    pub fn new(range: [f64; 2]) -> Self {
        let (low, high) = if range[0] <= range[1] { (range[0], range[1]) } else { (range[1], range[0]) };
        BrightnessJitter { low, high }
    }

    pub fn apply<R: Rng + ?Sized>(&self, image: Tensor, rng: &mut R) -> Tensor {
        let factor = if self.high > self.low { rng.gen_range(self.low..=self.high) } else { self.low };
        image.map(|v| (v * factor).clamp(0.0, 1.0))
    }
}
