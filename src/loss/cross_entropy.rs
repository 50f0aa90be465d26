/// Categorical cross-entropy loss for use with a Softmax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// Scalar loss against a one-hot target: `-log(predicted[target] + eps)`.
    pub fn loss(predicted: &[f64], target: usize) -> f64 {
        -(predicted[target] + EPS).ln()
    }

    /// Gradient of the combined Softmax + cross-entropy w.r.t. the logits:
    ///   ∂L/∂z_i = predicted[i] - onehot(target)[i]
    ///
    /// The Softmax layer's own derivative is identity, so this is passed
    /// into the backward pass unchanged.
    pub fn derivative(predicted: &[f64], target: usize) -> Vec<f64> {
        predicted
            .iter()
            .enumerate()
            .map(|(i, p)| if i == target { p - 1.0 } else { *p })
            .collect()
    }
}
