use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::SampleSource;
use crate::error::Result;
use crate::eval::metrics::{argmax, ClassificationReport, ConfusionMatrix, MetricAccumulator, MetricSummary};
use crate::network::Network;

/// Result of running a network over one split in inference mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub split: String,
    pub metrics: MetricSummary,
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
}

/// Forward-passes every sample of `source` (dropout off) and collects the
/// scalar metrics, the confusion matrix and the classification report.
pub fn evaluate<S>(network: &mut Network, source: &S, split: &str) -> Result<Evaluation>
where
    S: SampleSource + ?Sized,
{
    let mut acc = MetricAccumulator::new();
    let mut confusion = ConfusionMatrix::new(network.classes.len());
    for i in 0..source.len() {
        let (input, target) = source.get(i)?;
        let probabilities = network.predict(&input)?;
        acc.record(&probabilities, target);
        confusion.record(target, argmax(&probabilities));
    }
    let metrics = acc.summary(network.l2_penalty());
    let report = confusion.report(&network.classes);
    info!(
        "{} ({} samples): loss {:.4}, accuracy {:.2}%, precision {:.2}%, recall {:.2}%",
        split,
        acc.samples(),
        metrics.loss,
        metrics.accuracy * 100.0,
        metrics.precision * 100.0,
        metrics.recall * 100.0
    );
    Ok(Evaluation {
        split: split.to_string(),
        metrics,
        confusion,
        report,
    })
}

/// Confusion matrix as a plain-text grid with class names on both axes.
pub fn format_confusion(confusion: &ConfusionMatrix, class_names: &[String]) -> String {
    let width = class_names.iter().map(String::len).max().unwrap_or(4).max(6);
    let mut out = format!("{:>w$}", "true\\pred", w = width + 2);
    for name in class_names {
        out.push_str(&format!(" {:>w$}", name, w = width));
    }
    out.push('\n');
    for (name, row) in class_names.iter().zip(&confusion.counts) {
        out.push_str(&format!("{:>w$}", name, w = width + 2));
        for count in row {
            out.push_str(&format!(" {:>w$}", count, w = width));
        }
        out.push('\n');
    }
    out
}
