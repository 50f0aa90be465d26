use serde::{Deserialize, Serialize};

use crate::eval::MetricSummary;

/// Per-epoch training statistics emitted by `train_loop`.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, the training
/// loop sends one `EpochStats` value at the end of every completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Metrics accumulated over the epoch's training forward passes
    /// (dropout and brightness jitter active).
    pub train: MetricSummary,
    /// Validation metrics in inference mode, if a validation set was given.
    pub val: Option<MetricSummary>,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
