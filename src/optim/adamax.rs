use crate::network::Network;

/// Adamax: Adam with an infinity-norm second moment.
///
///   m ← β1·m + (1−β1)·g
///   u ← max(β2·u, |g|)
///   θ ← θ − (lr / (1−β1^t)) · m / (u + ε)
///
/// Moment buffers are created lazily on the first step, in the order the
/// network yields its trainable parameters.
pub struct Adamax {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: u64,
    moments: Vec<(Vec<f64>, Vec<f64>)>,
}

impl Adamax {
    pub fn new(learning_rate: f64) -> Adamax {
        Adamax {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            moments: Vec::new(),
        }
    }

    pub fn steps_taken(&self) -> u64 {
        self.t
    }

    /// Applies one update from the gradients accumulated in `network`,
    /// scaled by `grad_scale` (1 / batch size for mean gradients). Dense
    /// layers with an L2 coefficient get `2·l2·w` added to their gradient.
    pub fn step(&mut self, network: &mut Network, grad_scale: f64) {
        self.t += 1;
        let bias_correction = 1.0 - self.beta1.powi(self.t.min(i32::MAX as u64) as i32);
        let step_size = self.learning_rate / bias_correction;
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);

        for (k, (value, grad, l2)) in network.trainable_parameters().into_iter().enumerate() {
            if self.moments.len() <= k {
                self.moments.push((vec![0.0; value.data.len()], vec![0.0; value.data.len()]));
            }
            let (m, u) = &mut self.moments[k];
            for i in 0..value.data.len() {
                let g = grad.data[i] * grad_scale + 2.0 * l2 * value.data[i];
                m[i] = beta1 * m[i] + (1.0 - beta1) * g;
                u[i] = (beta2 * u[i]).max(g.abs());
                value.data[i] -= step_size * m[i] / (u[i] + epsilon);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::math::{Shape, Tensor};
    use crate::network::{ArchitectureSpec, LayerSpec};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn first_step_moves_each_weight_by_learning_rate() {
        let spec = ArchitectureSpec {
            name: "opt".into(),
            input: Shape::flat(3),
            layers: vec![LayerSpec::Dense { units: 4, activation: ActivationFunction::Softmax, l2: 0.0 }],
            classes: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        };
        let mut net = Network::from_spec(&spec, &mut ChaCha8Rng::seed_from_u64(4)).unwrap();
        let before = net.layers.clone();

        net.predict(&Tensor::flat(vec![1.0, -1.0, 0.5])).unwrap();
        net.backward(&[0.2, -0.4, 0.1, 0.1]).unwrap();
        let mut opt = Adamax::new(0.01);
        opt.step(&mut net, 1.0);

        // With m = 0.1 g and u = |g| after one step, the bias-corrected
        // update is exactly lr · sign(g) for every non-zero gradient.
        let (crate::layers::Layer::Dense(old), crate::layers::Layer::Dense(new)) = (&before[0], &net.layers[0]) else {
            panic!("expected dense layers");
        };
        for (a, b) in old.biases.data.iter().zip(&new.biases.data) {
            assert!(((a - b).abs() - 0.01).abs() < 1e-6);
        }
        assert_eq!(opt.steps_taken(), 1);
    }
}
