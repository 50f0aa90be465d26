use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::eval::MetricSummary;
use crate::train::epoch_stats::EpochStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Loss,
    Accuracy,
    Precision,
    Recall,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Loss, Metric::Accuracy, Metric::Precision, Metric::Recall];

    pub fn of(self, summary: &MetricSummary) -> f64 {
        match self {
            Metric::Loss => summary.loss,
            Metric::Accuracy => summary.accuracy,
            Metric::Precision => summary.precision,
            Metric::Recall => summary.recall,
        }
    }

    pub fn lower_is_better(self) -> bool {
        self == Metric::Loss
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Loss => "Loss",
            Metric::Accuracy => "Accuracy",
            Metric::Precision => "Precision",
            Metric::Recall => "Recall",
        };
        f.write_str(name)
    }
}

/// Best epoch (1-based) and its value for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestEpoch {
    pub metric: Metric,
    pub epoch: usize,
    pub value: f64,
}

/// Everything recorded during one training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub model: String,
    pub epochs: Vec<EpochStats>,
}

impl TrainingHistory {
    pub fn new(model: impl Into<String>) -> Self {
        TrainingHistory { model: model.into(), epochs: Vec::new() }
    }

    /// Values of `metric` per epoch, from validation when `validation` is set.
    /// Epochs without validation metrics are skipped.
    pub fn series(&self, metric: Metric, validation: bool) -> Vec<(usize, f64)> {
        self.epochs
            .iter()
            .filter_map(|e| {
                let summary = if validation { e.val.as_ref()? } else { &e.train };
                Some((e.epoch, metric.of(summary)))
            })
            .collect()
    }

    /// Arg-min for loss, arg-max for the other metrics, over validation
    /// values. The earliest epoch wins ties.
    pub fn best_epoch(&self, metric: Metric) -> Option<BestEpoch> {
        let mut best: Option<(usize, f64)> = None;
        for (epoch, value) in self.series(metric, true) {
            let better = match best {
                None => true,
                Some((_, current)) if metric.lower_is_better() => value < current,
                Some((_, current)) => value > current,
            };
            if better {
                best = Some((epoch, value));
            }
        }
        best.map(|(epoch, value)| BestEpoch { metric, epoch, value })
    }

    pub fn best_epochs(&self) -> Vec<BestEpoch> {
        Metric::ALL.iter().filter_map(|&m| self.best_epoch(m)).collect()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct Document<'a> {
            #[serde(flatten)]
            history: &'a TrainingHistory,
            best: Vec<BestEpoch>,
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let doc = Document { history: self, best: self.best_epochs() };
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &doc)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<TrainingHistory> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
