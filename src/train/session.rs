use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::AppConfig;
use crate::dataset::{BrightnessJitter, DatasetSplits, ImageLoader, ImageSet};
use crate::error::{BrainScanError, Result};
use crate::eval::{evaluate, Evaluation};
use crate::inference::ModelChoice;
use crate::network::{ArchitectureSpec, Network};
use crate::report::save_training_chart;
use crate::train::history::TrainingHistory;
use crate::train::loop_fn::train_loop;
use crate::train::train_config::TrainConfig;

/// Files and scores produced by one `train_model` run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model_path: PathBuf,
    pub history_path: PathBuf,
    pub chart_path: PathBuf,
    pub history: TrainingHistory,
    /// Train, validation and test evaluations, in that order.
    pub evaluations: Vec<Evaluation>,
}

/// Architecture for `choice` sized from the training config. The transfer
/// model needs a backbone artifact, from `backbone` or the config, and
/// takes its input size from that artifact unless one is configured.
pub fn build_spec(config: &AppConfig, choice: ModelChoice, backbone: Option<&Path>) -> Result<ArchitectureSpec> {
    let name = choice.artifact_name(&config.models);
    match choice {
        ModelChoice::CustomCnn => Ok(ArchitectureSpec::custom_cnn(
            name,
            config.training.cnn_image_size,
            config.training.cnn_filters,
        )),
        ModelChoice::Transfer => {
            let backbone = backbone
                .map(Path::to_path_buf)
                .or_else(|| config.models.backbone.clone())
                .ok_or_else(|| {
                    BrainScanError::Config("the transfer model needs a backbone artifact (--backbone or models.backbone)".into())
                })?;
            let image_size = match config.training.transfer_image_size {
                Some(size) => size,
                None => Network::artifact_input(&backbone)?.width,
            };
            Ok(ArchitectureSpec::transfer(name, image_size, backbone))
        }
    }
}

pub fn load_splits(config: &AppConfig) -> Result<DatasetSplits> {
    DatasetSplits::from_roots(
        &config.data.train_dir,
        &config.data.holdout_dir,
        config.data.valid_fraction,
        config.data.seed,
    )
}

/// Evaluates `network` on every split of `splits`.
pub fn evaluate_splits(network: &mut Network, splits: &DatasetSplits) -> Result<Vec<Evaluation>> {
    let loader = ImageLoader::for_shape(network.input)?;
    let mut out = Vec::with_capacity(3);
    for (name, samples) in [("train", &splits.train), ("validation", &splits.valid), ("test", &splits.test)] {
        let set = ImageSet::new(samples.clone(), loader);
        out.push(evaluate(network, &set, name)?);
    }
    Ok(out)
}

/// Index → split → build → train → save → evaluate.
///
/// Writes `<models.dir>/<name>.json`, `<name>_history.json` and
/// `<name>_history.svg`.
pub fn train_model(config: &AppConfig, choice: ModelChoice, backbone: Option<&Path>) -> Result<TrainingOutcome> {
    let spec = build_spec(config, choice, backbone)?;
    let splits = load_splits(config)?;
    if splits.train.is_empty() {
        return Err(BrainScanError::Dataset(format!(
            "no training images under {:?}",
            config.data.train_dir
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.data.seed);
    let mut network = Network::from_spec(&spec, &mut rng)?;
    info!("\n{}", network.summary());

    let loader = ImageLoader::for_shape(network.input)?;
    let train = ImageSet::new(splits.train.clone(), loader);
    let valid = ImageSet::new(splits.valid.clone(), loader);
    let batch_size = match choice {
        ModelChoice::Transfer => config.training.transfer_batch_size,
        ModelChoice::CustomCnn => config.training.cnn_batch_size,
    };
    let train_config = TrainConfig::new(config.training.epochs, batch_size, config.training.learning_rate)
        .with_seed(config.data.seed)
        .with_augment(BrightnessJitter::new(config.training.brightness_range));

    let history = train_loop(&mut network, &train, Some(&valid), &train_config)?;

    let model_path = config.models.artifact_path(&spec.name);
    network.save_json(&model_path)?;
    let history_path = config.models.dir.join(format!("{}_history.json", spec.name));
    history.save_json(&history_path)?;
    let chart_path = config.models.dir.join(format!("{}_history.svg", spec.name));
    save_training_chart(&history, &chart_path)?;
    info!("saved {:?}, {:?} and {:?}", model_path, history_path, chart_path);

    let evaluations = evaluate_splits(&mut network, &splits)?;
    Ok(TrainingOutcome { model_path, history_path, chart_path, history, evaluations })
}
