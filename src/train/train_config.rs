use std::sync::mpsc;

use crate::dataset::BrightnessJitter;
use crate::train::epoch_stats::EpochStats;

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`: total number of full passes over the training data
/// - `batch_size`: samples per mini-batch
/// - `learning_rate`: static Adamax learning rate
/// - `seed`: seeds shuffling and dropout
/// - `augment`: brightness jitter applied to training samples only
/// - `progress_tx`: optional channel sender; one `EpochStats` is sent per
///   completed epoch. If the receiver is dropped the loop
///   terminates early.
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
    pub augment: Option<BrightnessJitter>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl TrainConfig {
    /// Creates a `TrainConfig` with no augmentation or progress channel.
    pub fn new(epochs: usize, batch_size: usize, learning_rate: f64) -> Self {
        TrainConfig {
            epochs,
            batch_size,
            learning_rate,
            seed: 42,
            augment: None,
            progress_tx: None,
        }
    }

    pub fn with_augment(mut self, jitter: BrightnessJitter) -> Self {
        self.augment = Some(jitter);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
