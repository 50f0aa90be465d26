use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModelsConfig;
use crate::dataset::{ClassLabel, ImageLoader};
use crate::error::{BrainScanError, Result};
use crate::eval::argmax;
use crate::math::Tensor;
use crate::network::Network;

/// The two trained classifiers a user can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelChoice {
    Transfer,
    CustomCnn,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 2] = [ModelChoice::Transfer, ModelChoice::CustomCnn];

    pub fn key(self) -> &'static str {
        match self {
            ModelChoice::Transfer => "transfer",
            ModelChoice::CustomCnn => "cnn",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ModelChoice::Transfer => "Transfer Learning",
            ModelChoice::CustomCnn => "Custom CNN",
        }
    }

    pub fn artifact_name(self, models: &ModelsConfig) -> String {
        match self {
            ModelChoice::Transfer => models.transfer_name.clone(),
            ModelChoice::CustomCnn => models.cnn_name.clone(),
        }
    }
}

impl FromStr for ModelChoice {
    type Err = BrainScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transfer" | "transfer_learning" | "xception" => Ok(ModelChoice::Transfer),
            "cnn" | "custom_cnn" | "custom" => Ok(ModelChoice::CustomCnn),
            other => Err(BrainScanError::Config(format!("unknown model '{}'", other))),
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Class probabilities for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Indexed by `ClassLabel::index`; sums to 1.
    pub probabilities: Vec<f64>,
    pub label: ClassLabel,
    pub confidence: f64,
}

impl Prediction {
    pub fn from_probabilities(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.len() != ClassLabel::COUNT {
            return Err(BrainScanError::Shape(format!(
                "expected {} class probabilities, got {}",
                ClassLabel::COUNT,
                probabilities.len()
            )));
        }
        let best = argmax(&probabilities);
        let label = ClassLabel::from_index(best)
            .ok_or_else(|| BrainScanError::Shape(format!("class index {} out of range", best)))?;
        Ok(Prediction { confidence: probabilities[best], label, probabilities })
    }

    /// Classes ordered by descending probability.
    pub fn ranked(&self) -> Vec<(ClassLabel, f64)> {
        let mut ranked: Vec<(ClassLabel, f64)> = ClassLabel::ALL
            .iter()
            .map(|&label| (label, self.probabilities[label.index()]))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// A loaded model artifact together with the preprocessing its input
/// shape requires.
#[derive(Debug, Clone)]
pub struct Classifier {
    pub network: Network,
    pub loader: ImageLoader,
}

impl Classifier {
    pub fn new(network: Network) -> Result<Self> {
        let expected = ClassLabel::class_names();
        let parsed: Vec<ClassLabel> = network
            .classes
            .iter()
            .map(|c| c.parse())
            .collect::<Result<_>>()?;
        if parsed != ClassLabel::ALL {
            return Err(BrainScanError::Architecture(format!(
                "model classes {:?} do not match {:?}",
                network.classes, expected
            )));
        }
        let loader = ImageLoader::for_shape(network.input)?;
        Ok(Classifier { network, loader })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let classifier = Classifier::new(Network::load_json(path)?)?;
        info!(
            "loaded model '{}' from {:?} ({} input, {} parameters)",
            classifier.network.name,
            path,
            classifier.network.input,
            classifier.network.parameter_count()
        );
        Ok(classifier)
    }

    pub fn name(&self) -> &str {
        &self.network.name
    }

    pub fn predict_tensor(&mut self, input: &Tensor) -> Result<Prediction> {
        Prediction::from_probabilities(self.network.predict(input)?)
    }

    pub fn predict_image(&mut self, image: &DynamicImage) -> Result<Prediction> {
        let input = self.loader.to_tensor(image)?;
        self.predict_tensor(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Shape;
    use crate::network::ArchitectureSpec;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn classifier() -> Classifier {
        let spec = ArchitectureSpec::custom_cnn("tiny", 16, [2, 2, 2, 2]);
        Classifier::new(Network::from_spec(&spec, &mut ChaCha8Rng::seed_from_u64(8)).unwrap()).unwrap()
    }

    #[test]
    fn prediction_picks_argmax_and_ranks_descending() {
        let p = Prediction::from_probabilities(vec![0.1, 0.2, 0.6, 0.1]).unwrap();
        assert_eq!(p.label, ClassLabel::NoTumor);
        assert_eq!(p.confidence, 0.6);
        let ranked = p.ranked();
        assert_eq!(ranked[0].0, ClassLabel::NoTumor);
        assert_eq!(ranked[1].0, ClassLabel::Meningioma);
        assert!(Prediction::from_probabilities(vec![1.0]).is_err());
    }

    #[test]
    fn image_prediction_is_a_distribution_and_repeatable() {
        let mut c = classifier();
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(30, 20, image::Rgb([120, 60, 200])));
        let a = c.predict_image(&img).unwrap();
        let b = c.predict_image(&img).unwrap();
        assert_eq!(a.probabilities.len(), 4);
        assert!((a.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(a, b);
        assert_eq!(c.loader.shape(), Shape::rgb(16));
    }

    #[test]
    fn rejects_models_with_foreign_classes() {
        let mut spec = ArchitectureSpec::custom_cnn("tiny", 16, [2, 2, 2, 2]);
        spec.classes = vec!["cat".into(), "dog".into(), "cow".into(), "pig".into()];
        let net = Network::from_spec(&spec, &mut ChaCha8Rng::seed_from_u64(8)).unwrap();
        assert!(Classifier::new(net).is_err());
    }

    #[test]
    fn model_choice_parses_keys() {
        assert_eq!("cnn".parse::<ModelChoice>().unwrap(), ModelChoice::CustomCnn);
        assert_eq!("Transfer".parse::<ModelChoice>().unwrap(), ModelChoice::Transfer);
        assert!("vgg".parse::<ModelChoice>().is_err());
    }
}
