pub mod evaluator;
pub mod metrics;

pub use evaluator::{evaluate, format_confusion, Evaluation};
pub use metrics::{
    argmax, ClassMetrics, ClassificationReport, ConfusionMatrix, MetricAccumulator, MetricSummary,
};
