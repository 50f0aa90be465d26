use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[serde(rename = "relu")]
    ReLU,
    Identity,
    /// Softmax is vector-valued; `Dense` applies it over the whole output
    /// row instead of element-wise.
    Softmax,
}

impl ActivationFunction {
    /// Element-wise activation. Softmax is handled by `softmax()`.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
        }
    }

    /// Element-wise derivative with respect to the pre-activation.
    ///
    /// Softmax returns `1.0`: callers feed the output layer a gradient that
    /// is already expressed w.r.t. the logits (`p - y` for cross-entropy,
    /// the softmax Jacobian row for saliency), so the Jacobian must not be
    /// applied twice.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => 1.0,
        }
    }

    /// Whether He (true) or Xavier (false) initialization suits this activation.
    pub fn prefers_he_init(&self) -> bool {
        matches!(self, ActivationFunction::ReLU)
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
