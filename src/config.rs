//! Application configuration.
//!
//! Resolution order (highest wins):
//! 1. `BRAINSCAN_`-prefixed environment variables, `__` separating sections
//!    (e.g. `BRAINSCAN_TRAINING__EPOCHS=10`)
//! 2. the TOML file given with `--config`, or `brainscan.toml` in the
//!    working directory
//! 3. built-in defaults
//!
//! A `.env` file is loaded into the process environment first, which is how
//! the explanation API key is normally supplied. The key itself is never
//! part of `AppConfig`.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::network::CUSTOM_CNN_FILTERS;

pub const DEFAULT_CONFIG_FILE: &str = "brainscan.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub models: ModelsConfig,
    pub saliency: SaliencyConfig,
    pub explain: ExplainConfig,
    pub studio: StudioConfig,
}

/// Where the MRI images live and how the holdout directory is split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// One sub-directory per class; becomes the training split.
    pub train_dir: PathBuf,
    /// One sub-directory per class; split into validation and test.
    pub holdout_dir: PathBuf,
    /// Fraction of each holdout class that goes to validation.
    pub valid_fraction: f64,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_dir: PathBuf::from("data/Training"),
            holdout_dir: PathBuf::from("data/Testing"),
            valid_fraction: 0.5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub transfer_batch_size: usize,
    pub cnn_batch_size: usize,
    /// Square input side for the transfer model. Unset means the input
    /// size recorded in the backbone artifact.
    pub transfer_image_size: Option<usize>,
    /// Square input side for the custom CNN.
    pub cnn_image_size: usize,
    /// Filter counts of the four convolution blocks of the custom CNN.
    pub cnn_filters: [usize; 4],
    /// Uniform range of the brightness factor applied to training images.
    pub brightness_range: [f64; 2],
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            learning_rate: 0.001,
            transfer_batch_size: 32,
            cnn_batch_size: 16,
            transfer_image_size: None,
            cnn_image_size: 224,
            cnn_filters: CUSTOM_CNN_FILTERS,
            brightness_range: [0.8, 1.2],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding model artifacts and their training records.
    pub dir: PathBuf,
    pub transfer_name: String,
    pub cnn_name: String,
    /// Pretrained artifact whose feature layers seed the transfer model.
    pub backbone: Option<PathBuf>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("trained_models"),
            transfer_name: "transfer_model".into(),
            cnn_name: "cnn_model".into(),
            backbone: None,
        }
    }
}

impl ModelsConfig {
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

/// Post-processing knobs of the saliency overlay. The defaults are tuned
/// for axial brain MRI slices centred in the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyConfig {
    pub output_dir: PathBuf,
    /// Pixels trimmed from the inscribed circle's radius.
    pub mask_margin: f64,
    /// Masked values below this percentile are zeroed.
    pub threshold_percentile: f64,
    /// Side of the square Gaussian kernel; must be odd.
    pub blur_kernel: usize,
    pub blur_sigma: f64,
    /// Weight of the heatmap in the final blend; the source gets `1 - alpha`.
    pub heatmap_alpha: f64,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("saliency_maps"),
            mask_margin: 10.0,
            threshold_percentile: 8.0,
            blur_kernel: 11,
            blur_sigma: 2.0,
            heatmap_alpha: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-1.5-flash".into(),
            api_key_env: "GOOGLE_API_KEY".into(),
            timeout_secs: 120,
        }
    }
}

impl ExplainConfig {
    /// Reads the API key from the environment. Empty values count as unset.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub addr: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self { addr: "127.0.0.1:8501".into() }
    }
}

/// Loads `.env`, then resolves the layered configuration.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Ok(env_file) = dotenvy::dotenv() {
        debug!("loaded environment from {:?}", env_file);
    }

    let file = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = Figment::from(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&file))
        .merge(Env::prefixed("BRAINSCAN_").split("__"))
        .extract::<AppConfig>()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_training_setup() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.training.epochs, 5);
        assert!((cfg.training.learning_rate - 0.001).abs() < 1e-12);
        assert_eq!(cfg.training.cnn_filters, [512, 256, 128, 64]);
        assert_eq!(cfg.saliency.blur_kernel, 11);
        assert!((cfg.saliency.threshold_percentile - 8.0).abs() < 1e-12);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brainscan.toml");
        std::fs::write(&path, "[training]\nepochs = 2\n\n[studio]\naddr = \"0.0.0.0:9000\"\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.training.epochs, 2);
        assert_eq!(cfg.training.cnn_batch_size, 16);
        assert_eq!(cfg.studio.addr, "0.0.0.0:9000");
    }

    #[test]
    fn artifact_path_uses_json_extension() {
        let models = ModelsConfig::default();
        assert_eq!(models.artifact_path("cnn_model"), PathBuf::from("trained_models/cnn_model.json"));
    }
}
