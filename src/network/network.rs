use std::path::Path;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::activation::ActivationFunction;
use crate::error::{BrainScanError, Result};
use crate::layers::{Conv2d, Dense, Dropout, GlobalMaxPool, Layer, MaxPool2d};
use crate::math::{Matrix, Shape, Tensor};
use crate::network::spec::{ArchitectureSpec, LayerSpec};

/// A sequential classifier: the trained model artifact.
///
/// Serialized as one JSON document holding the architecture description,
/// the input shape, the output class names and every layer's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub spec: ArchitectureSpec,
    pub input: Shape,
    pub classes: Vec<String>,
    pub layers: Vec<Layer>,
    /// Number of leading layers excluded from optimizer updates.
    #[serde(default)]
    pub frozen: usize,
}

impl Network {
    /// Builds a freshly initialized network from a spec. A `Backbone` entry
    /// loads the feature layers of another artifact from disk.
    pub fn from_spec(spec: &ArchitectureSpec, rng: &mut ChaCha8Rng) -> Result<Network> {
        let mut shape = spec.input;
        let mut layers: Vec<Layer> = Vec::with_capacity(spec.layers.len());
        let mut frozen = 0;

        for (i, layer_spec) in spec.layers.iter().enumerate() {
            let layer = match layer_spec {
                LayerSpec::Backbone { artifact, trainable } => {
                    if i != 0 {
                        return Err(BrainScanError::Architecture(
                            "a backbone must be the first layer".into(),
                        ));
                    }
                    let pretrained = Network::load_json(artifact)?;
                    if pretrained.input != spec.input {
                        return Err(BrainScanError::Architecture(format!(
                            "backbone {:?} expects {} input, spec declares {}",
                            artifact, pretrained.input, spec.input
                        )));
                    }
                    for layer in pretrained.layers.into_iter().take_while(|l| !l.is_head()) {
                        shape = layer.output_shape(&shape)?;
                        layers.push(layer);
                    }
                    if layers.is_empty() {
                        return Err(BrainScanError::Architecture(format!(
                            "backbone {:?} has no feature layers",
                            artifact
                        )));
                    }
                    if !trainable {
                        frozen = layers.len();
                    }
                    info!("loaded backbone from {:?} ({} feature layers)", artifact, layers.len());
                    Layer::GlobalMaxPool(GlobalMaxPool::default())
                }
                LayerSpec::Conv2d { filters, kernel, activation } => {
                    Layer::Conv2d(Conv2d::new(shape.channels, *filters, *kernel, *activation, rng)?)
                }
                LayerSpec::MaxPool2d { size } => Layer::MaxPool2d(MaxPool2d::new(*size)),
                LayerSpec::GlobalMaxPool => Layer::GlobalMaxPool(GlobalMaxPool::default()),
                LayerSpec::Dropout { rate } => {
                    if !(0.0..1.0).contains(rate) {
                        return Err(BrainScanError::Architecture(format!(
                            "dropout rate must be in [0, 1), got {}",
                            rate
                        )));
                    }
                    Layer::Dropout(Dropout::new(*rate))
                }
                LayerSpec::Flatten => Layer::flatten(),
                LayerSpec::Dense { units, activation, l2 } => {
                    Layer::Dense(Dense::new(*units, shape.len(), *activation, *l2, rng))
                }
            };
            shape = layer.output_shape(&shape)?;
            layers.push(layer);
        }

        let network = Network {
            name: spec.name.clone(),
            spec: spec.clone(),
            input: spec.input,
            classes: spec.classes.clone(),
            layers,
            frozen,
        };
        network.validate()?;
        Ok(network)
    }

    /// Runs shape inference over the layers and checks that the network ends
    /// in a softmax over `classes`.
    pub fn validate(&self) -> Result<()> {
        let mut shape = self.input;
        for layer in &self.layers {
            shape = layer.output_shape(&shape)?;
        }
        if shape != Shape::flat(self.classes.len()) {
            return Err(BrainScanError::Architecture(format!(
                "network outputs {} but declares {} classes",
                shape,
                self.classes.len()
            )));
        }
        match self.layers.last() {
            Some(Layer::Dense(d)) if d.activator == ActivationFunction::Softmax => Ok(()),
            _ => Err(BrainScanError::Architecture(
                "the output layer must be a softmax dense layer".into(),
            )),
        }
    }

    /// Inference-mode forward pass (dropout disabled). Returns class probabilities.
    pub fn predict(&mut self, input: &Tensor) -> Result<Vec<f64>> {
        self.run(input.clone(), None)
    }

    /// Training-mode forward pass; activations are cached for `backward`.
    pub fn forward_train(&mut self, input: Tensor, rng: &mut ChaCha8Rng) -> Result<Vec<f64>> {
        self.run(input, Some(rng))
    }

    fn run(&mut self, input: Tensor, mut rng: Option<&mut ChaCha8Rng>) -> Result<Vec<f64>> {
        if input.shape != self.input {
            return Err(BrainScanError::Shape(format!(
                "model '{}' expects {} input, got {}",
                self.name, self.input, input.shape
            )));
        }
        let mut current = input;
        for layer in &mut self.layers {
            current = layer.forward(current, rng.as_deref_mut())?;
        }
        Ok(current.data)
    }

    /// Back-propagates a gradient given w.r.t. the output logits, accumulating
    /// parameter gradients, and returns the gradient w.r.t. the input.
    pub fn backward(&mut self, grad_logits: &[f64]) -> Result<Tensor> {
        let mut grad = Tensor::flat(grad_logits.to_vec());
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad)?;
        }
        Ok(grad)
    }

    /// Gradient of the softmax probability of `class` w.r.t. every input
    /// value. Parameter gradients touched on the way are cleared.
    pub fn class_score_gradient(&mut self, input: &Tensor, class: usize) -> Result<Tensor> {
        let probs = self.predict(input)?;
        let Some(&p_c) = probs.get(class) else {
            return Err(BrainScanError::Shape(format!(
                "class index {} out of range for {} outputs",
                class,
                probs.len()
            )));
        };
        // ∂p_c/∂z_j = p_c (δ_cj − p_j)
        let grad_logits: Vec<f64> = probs
            .iter()
            .enumerate()
            .map(|(j, &p_j)| {
                let kronecker = if j == class { 1.0 } else { 0.0 };
                p_c * (kronecker - p_j)
            })
            .collect();
        let grad = self.backward(&grad_logits)?;
        self.zero_grad();
        Ok(grad)
    }

    pub fn zero_grad(&mut self) {
        self.layers.iter_mut().for_each(Layer::zero_grad);
    }

    /// `(value, gradient, l2)` for every matrix the optimizer may update.
    pub fn trainable_parameters(&mut self) -> Vec<(&mut Matrix, &Matrix, f64)> {
        let frozen = self.frozen;
        self.layers
            .iter_mut()
            .skip(frozen)
            .flat_map(|layer| layer.parameters())
            .collect()
    }

    pub fn l2_penalty(&self) -> f64 {
        self.layers.iter().map(Layer::l2_penalty).sum()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(Layer::parameter_count).sum()
    }

    /// Layer-by-layer table of output shapes and parameter counts.
    pub fn summary(&self) -> String {
        let mut out = format!("Model: {}\n{:<4} {:<16} {:<16} {:>12}\n", self.name, "#", "layer", "output", "params");
        let mut shape = self.input;
        for (i, layer) in self.layers.iter().enumerate() {
            shape = layer.output_shape(&shape).unwrap_or(shape);
            let frozen = if i < self.frozen { " (frozen)" } else { "" };
            out.push_str(&format!(
                "{:<4} {:<16} {:<16} {:>12}{}\n",
                i,
                layer.kind(),
                shape.to_string(),
                layer.parameter_count(),
                frozen
            ));
        }
        out.push_str(&format!("Total params: {}\n", self.parameter_count()));
        out
    }

    /// Serializes the network to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a network previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<Network> {
        let file = std::fs::File::open(path).map_err(|e| {
            BrainScanError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
        })?;
        let reader = std::io::BufReader::new(file);
        let network: Network = serde_json::from_reader(reader)?;
        network.validate()?;
        Ok(network)
    }

    /// Input shape recorded in an artifact, without building its layers.
    pub fn artifact_input(path: &Path) -> Result<Shape> {
        #[derive(Deserialize)]
        struct Header {
            input: Shape,
        }
        let file = std::fs::File::open(path).map_err(|e| {
            BrainScanError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
        })?;
        let header: Header = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(header.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn tiny_spec() -> ArchitectureSpec {
        let mut spec = ArchitectureSpec::custom_cnn("tiny", 8, [2, 2, 2, 2]);
        spec.input = Shape::rgb(16);
        spec
    }

    #[test]
    fn builds_custom_cnn_and_outputs_probabilities() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut net = Network::from_spec(&tiny_spec(), &mut rng).unwrap();
        let input = Tensor::from_vec(Shape::rgb(16), (0..768).map(|i| (i % 17) as f64 / 17.0).collect()).unwrap();
        let probs = net.predict(&input).unwrap();
        assert_eq!(probs.len(), 4);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inference_is_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut net = Network::from_spec(&tiny_spec(), &mut rng).unwrap();
        let input = Tensor::from_vec(Shape::rgb(16), (0..768).map(|i| (i % 5) as f64 / 5.0).collect()).unwrap();
        let first = net.predict(&input).unwrap();
        let second = net.predict(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_wrong_input_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut net = Network::from_spec(&tiny_spec(), &mut rng).unwrap();
        assert!(net.predict(&Tensor::zeros(Shape::rgb(8))).is_err());
    }

    #[test]
    fn pooling_too_deep_for_input_is_an_architecture_error() {
        let mut spec = tiny_spec();
        spec.input = Shape::rgb(8);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(Network::from_spec(&spec, &mut rng).is_err());
    }

    #[test]
    fn class_score_gradient_matches_finite_differences() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let spec = ArchitectureSpec {
            name: "grad".into(),
            input: Shape::new(1, 4, 4),
            layers: vec![
                LayerSpec::Conv2d { filters: 2, kernel: 3, activation: ActivationFunction::Identity },
                LayerSpec::Flatten,
                LayerSpec::Dense { units: 4, activation: ActivationFunction::Softmax, l2: 0.0 },
            ],
            classes: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        };
        let mut net = Network::from_spec(&spec, &mut rng).unwrap();
        let x = Tensor::from_vec(Shape::new(1, 4, 4), (0..16).map(|i| (i as f64 * 0.37).sin()).collect()).unwrap();
        let grad = net.class_score_gradient(&x, 2).unwrap();

        let eps = 1e-6;
        for i in [0usize, 5, 10, 15] {
            let mut plus = x.clone();
            plus.data[i] += eps;
            let mut minus = x.clone();
            minus.data[i] -= eps;
            let numeric = (net.predict(&plus).unwrap()[2] - net.predict(&minus).unwrap()[2]) / (2.0 * eps);
            assert!((numeric - grad.data[i]).abs() < 1e-7, "index {}", i);
        }
    }

    #[test]
    fn transfer_spec_reuses_backbone_feature_layers() {
        let dir = tempfile::tempdir().unwrap();
        let backbone_path = dir.path().join("backbone.json");
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let backbone = Network::from_spec(&tiny_spec(), &mut rng).unwrap();
        backbone.save_json(&backbone_path).unwrap();

        let mut spec = ArchitectureSpec::transfer("tl", 16, &backbone_path);
        if let LayerSpec::Backbone { trainable, .. } = &mut spec.layers[0] {
            *trainable = false;
        }
        let net = Network::from_spec(&spec, &mut rng).unwrap();
        // 4 conv + 4 pool + 2 dropout from the backbone, then global pool.
        assert_eq!(net.frozen, 10);
        assert!(matches!(net.layers[10], Layer::GlobalMaxPool(_)));
        assert_eq!(net.layers.len(), 16);
    }

    #[test]
    fn save_and_load_preserve_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("tiny.json");
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut net = Network::from_spec(&tiny_spec(), &mut rng).unwrap();
        net.save_json(&path).unwrap();
        let mut loaded = Network::load_json(&path).unwrap();

        let input = Tensor::from_vec(Shape::rgb(16), vec![0.5; 768]).unwrap();
        let a = net.predict(&input).unwrap();
        let b = loaded.predict(&input).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}
