use std::fmt;

use serde::{Deserialize, Serialize};

use crate::loss::CrossEntropyLoss;

/// Probability above which an output unit counts as a positive prediction
/// for the precision and recall metrics.
pub const POSITIVE_THRESHOLD: f64 = 0.5;

/// The four scalar metrics tracked per epoch and per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub loss: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Running totals for `MetricSummary`.
///
/// Precision and recall are computed over the whole one-hot matrix: every
/// (sample, class) cell with probability above `POSITIVE_THRESHOLD` is a
/// positive prediction, so a sample whose top probability is below the
/// threshold contributes a false negative and no positive.
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    samples: usize,
    loss_sum: f64,
    correct: usize,
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, probabilities: &[f64], target: usize) {
        self.samples += 1;
        self.loss_sum += CrossEntropyLoss::loss(probabilities, target);
        if argmax(probabilities) == target {
            self.correct += 1;
        }
        for (class, &p) in probabilities.iter().enumerate() {
            let predicted = p > POSITIVE_THRESHOLD;
            match (predicted, class == target) {
                (true, true) => self.true_positives += 1,
                (true, false) => self.false_positives += 1,
                (false, true) => self.false_negatives += 1,
                (false, false) => {}
            }
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Mean metrics so far. `extra_loss` is added to the mean cross-entropy
    /// (the weight penalty of regularized layers).
    pub fn summary(&self, extra_loss: f64) -> MetricSummary {
        if self.samples == 0 {
            return MetricSummary::default();
        }
        let n = self.samples as f64;
        MetricSummary {
            loss: self.loss_sum / n + extra_loss,
            accuracy: self.correct as f64 / n,
            precision: ratio(self.true_positives, self.true_positives + self.false_positives),
            recall: ratio(self.true_positives, self.true_positives + self.false_negatives),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in v.iter().enumerate() {
        if x > v[best] {
            best = i;
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Confusion matrix & classification report
// ---------------------------------------------------------------------------

/// `counts[true][predicted]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(classes: usize) -> Self {
        ConfusionMatrix { counts: vec![vec![0; classes]; classes] }
    }

    pub fn classes(&self) -> usize {
        self.counts.len()
    }

    pub fn record(&mut self, actual: usize, predicted: usize) {
        self.counts[actual][predicted] += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    fn predicted_as(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.classes()).map(|i| self.counts[i][i]).sum();
        ratio(correct, self.total())
    }

    pub fn report(&self, class_names: &[String]) -> ClassificationReport {
        let per_class: Vec<ClassMetrics> = (0..self.classes())
            .map(|c| {
                let tp = self.counts[c][c];
                let precision = ratio(tp, self.predicted_as(c));
                let recall = ratio(tp, self.support(c));
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    name: class_names.get(c).cloned().unwrap_or_else(|| c.to_string()),
                    precision,
                    recall,
                    f1,
                    support: self.support(c),
                }
            })
            .collect();

        let total = self.total();
        let k = per_class.len().max(1) as f64;
        let macro_avg = AverageMetrics {
            precision: per_class.iter().map(|m| m.precision).sum::<f64>() / k,
            recall: per_class.iter().map(|m| m.recall).sum::<f64>() / k,
            f1: per_class.iter().map(|m| m.f1).sum::<f64>() / k,
        };
        let weight = |m: &ClassMetrics| m.support as f64 / total.max(1) as f64;
        let weighted_avg = AverageMetrics {
            precision: per_class.iter().map(|m| m.precision * weight(m)).sum(),
            recall: per_class.iter().map(|m| m.recall * weight(m)).sum(),
            f1: per_class.iter().map(|m| m.f1 * weight(m)).sum(),
        };

        ClassificationReport {
            accuracy: self.accuracy(),
            per_class,
            macro_avg,
            weighted_avg,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Per-class precision / recall / F1 plus accuracy and averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub total: usize,
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>14} {:>10} {:>10} {:>10.2} {:>10}", "accuracy", "", "", self.accuracy, self.total)?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.total
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholded_precision_and_recall() {
        let mut acc = MetricAccumulator::new();
        acc.record(&[0.9, 0.05, 0.03, 0.02], 0); // TP
        acc.record(&[0.6, 0.3, 0.05, 0.05], 1); // FP for 0, FN for 1
        acc.record(&[0.4, 0.3, 0.2, 0.1], 0); // below threshold: FN only
        let s = acc.summary(0.0);
        assert!((s.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.precision - 0.5).abs() < 1e-12);
        assert!((s.recall - 1.0 / 3.0).abs() < 1e-12);
        assert!(s.loss > 0.0);
    }

    #[test]
    fn empty_accumulator_is_all_zero() {
        assert_eq!(MetricAccumulator::new().summary(1.0), MetricSummary::default());
    }

    #[test]
    fn report_matches_hand_computed_values() {
        let mut cm = ConfusionMatrix::new(2);
        for _ in 0..3 {
            cm.record(0, 0);
        }
        cm.record(0, 1);
        cm.record(1, 1);
        cm.record(1, 0);
        let names = vec!["a".to_string(), "b".to_string()];
        let report = cm.report(&names);
        assert_eq!(report.total, 6);
        assert!((report.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert!((report.per_class[0].precision - 0.75).abs() < 1e-12);
        assert!((report.per_class[1].recall - 0.5).abs() < 1e-12);
        assert_eq!(report.per_class[0].support, 4);
        let text = report.to_string();
        assert!(text.contains("weighted avg"));
        assert!(text.contains("precision"));
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), 1);
    }
}
