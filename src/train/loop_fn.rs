use std::time::Instant;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::dataset::SampleSource;
use crate::error::{BrainScanError, Result};
use crate::eval::{evaluate, MetricAccumulator};
use crate::loss::CrossEntropyLoss;
use crate::network::Network;
use crate::optim::Adamax;
use crate::train::epoch_stats::EpochStats;
use crate::train::history::TrainingHistory;
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `network` for `config.epochs` epochs with Adamax and categorical
/// cross-entropy, returning the per-epoch history.
///
/// # Arguments
/// - `network`: modified in place
/// - `train`: training samples; brightness jitter applies here only
/// - `valid`: optional validation samples, evaluated after every epoch
/// - `config`: hyperparameters and optional progress channel
///
/// # Early termination
/// The loop breaks early if the `progress_tx` receiver has been dropped.
pub fn train_loop<T, V>(
    network: &mut Network,
    train: &T,
    valid: Option<&V>,
    config: &TrainConfig,
) -> Result<TrainingHistory>
where
    T: SampleSource + ?Sized,
    V: SampleSource + ?Sized,
{
    if train.is_empty() {
        return Err(BrainScanError::Training("the training split is empty".into()));
    }
    if config.batch_size == 0 {
        return Err(BrainScanError::Training("batch_size must be at least 1".into()));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut optimizer = Adamax::new(config.learning_rate);
    let mut history = TrainingHistory::new(network.name.clone());
    info!(
        "training '{}' for {} epochs on {} samples (batch {}, lr {})",
        network.name,
        config.epochs,
        train.len(),
        config.batch_size,
        config.learning_rate
    );

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();

        // ── One full pass over the training data ───────────────────────────
        let train_metrics = run_one_epoch(network, train, &mut optimizer, config, &mut rng)?;

        // ── Validation ────────────────────────────────────────────────────
        let val = match valid {
            Some(v) if !v.is_empty() => Some(evaluate(network, v, "validation")?.metrics),
            _ => None,
        };

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train: train_metrics,
            val,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        info!(
            "epoch {}/{}: loss {:.4} acc {:.4} | val_loss {} val_acc {} ({} ms)",
            epoch,
            config.epochs,
            stats.train.loss,
            stats.train.accuracy,
            val.map_or("-".to_string(), |v| format!("{:.4}", v.loss)),
            val.map_or("-".to_string(), |v| format!("{:.4}", v.accuracy)),
            stats.elapsed_ms
        );
        history.epochs.push(stats.clone());

        // ── Emit progress ─────────────────────────────────────────────────
        if let Some(ref tx) = config.progress_tx {
            if tx.send(stats).is_err() {
                info!("progress receiver dropped, stopping after epoch {}", epoch);
                break;
            }
        }
    }

    Ok(history)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// One epoch of shuffled mini-batch Adamax. Returns metrics accumulated from
/// the training-mode forward passes.
fn run_one_epoch<T>(
    network: &mut Network,
    train: &T,
    optimizer: &mut Adamax,
    config: &TrainConfig,
    rng: &mut ChaCha8Rng,
) -> Result<crate::eval::MetricSummary>
where
    T: SampleSource + ?Sized,
{
    let n = train.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let mut acc = MetricAccumulator::new();

    for (batch_no, batch) in indices.chunks(config.batch_size).enumerate() {
        network.zero_grad();
        for &idx in batch {
            let (mut input, target) = train.get(idx)?;
            if let Some(jitter) = &config.augment {
                input = jitter.apply(input, rng);
            }
            let output = network.forward_train(input, rng)?;
            acc.record(&output, target);
            let grad = CrossEntropyLoss::derivative(&output, target);
            network.backward(&grad)?;
        }
        optimizer.step(network, 1.0 / batch.len() as f64);
        debug!("batch {} ({} samples) done", batch_no + 1, batch.len());
    }
    network.zero_grad();

    Ok(acc.summary(network.l2_penalty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::math::{Shape, Tensor};
    use crate::network::{ArchitectureSpec, LayerSpec};
    use std::sync::mpsc;

    fn separable_data() -> Vec<(Tensor, usize)> {
        (0..40)
            .map(|i| {
                let class = i % 4;
                let mut x = vec![0.1; 4];
                x[class] = 0.9;
                (Tensor::flat(x), class)
            })
            .collect()
    }

    fn linear_net() -> Network {
        let spec = ArchitectureSpec {
            name: "linear".into(),
            input: Shape::flat(4),
            layers: vec![LayerSpec::Dense { units: 4, activation: ActivationFunction::Softmax, l2: 0.0 }],
            classes: crate::dataset::ClassLabel::class_names(),
        };
        Network::from_spec(&spec, &mut ChaCha8Rng::seed_from_u64(0)).unwrap()
    }

    #[test]
    fn loss_decreases_on_separable_data() {
        let data = separable_data();
        let mut net = linear_net();
        let config = TrainConfig::new(30, 8, 0.05);
        let history = train_loop(&mut net, data.as_slice(), Some(data.as_slice()), &config).unwrap();
        assert_eq!(history.epochs.len(), 30);
        let first = history.epochs[0].val.unwrap().loss;
        let last = history.epochs[29].val.unwrap().loss;
        assert!(last < first, "{} !< {}", last, first);
        assert!(history.epochs[29].val.unwrap().accuracy > 0.99);
    }

    #[test]
    fn sends_one_stats_per_epoch() {
        let data = separable_data();
        let mut net = linear_net();
        let (tx, rx) = mpsc::channel();
        let mut config = TrainConfig::new(3, 16, 0.01);
        config.progress_tx = Some(tx);
        train_loop(&mut net, data.as_slice(), None::<&[(Tensor, usize)]>, &config).unwrap();
        drop(config);
        let stats: Vec<EpochStats> = rx.iter().collect();
        assert_eq!(stats.iter().map(|s| s.epoch).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(stats.iter().all(|s| s.val.is_none()));
    }

    #[test]
    fn dropped_receiver_stops_after_first_epoch() {
        let data = separable_data();
        let mut net = linear_net();
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut config = TrainConfig::new(5, 8, 0.01);
        config.progress_tx = Some(tx);
        let history = train_loop(&mut net, data.as_slice(), None::<&[(Tensor, usize)]>, &config).unwrap();
        assert_eq!(history.epochs.len(), 1);
    }

    #[test]
    fn same_seed_gives_same_weights() {
        let data = separable_data();
        let config = TrainConfig::new(2, 8, 0.01);
        let mut a = linear_net();
        let mut b = linear_net();
        train_loop(&mut a, data.as_slice(), None::<&[(Tensor, usize)]>, &config).unwrap();
        train_loop(&mut b, data.as_slice(), None::<&[(Tensor, usize)]>, &config).unwrap();
        let input = Tensor::flat(vec![0.9, 0.1, 0.1, 0.1]);
        assert_eq!(a.predict(&input).unwrap(), b.predict(&input).unwrap());
    }

    #[test]
    fn empty_training_split_is_an_error() {
        let mut net = linear_net();
        let empty: Vec<(Tensor, usize)> = Vec::new();
        let config = TrainConfig::new(1, 8, 0.01);
        assert!(train_loop(&mut net, empty.as_slice(), None::<&[(Tensor, usize)]>, &config).is_err());
    }
}
