pub mod error;
pub mod config;
pub mod logging;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod dataset;
pub mod train;
pub mod eval;
pub mod report;
pub mod saliency;
pub mod explain;
pub mod inference;

// Convenience re-exports
pub use error::{BrainScanError, Result};
pub use config::{load_config, AppConfig};
pub use math::{Matrix, Shape, Tensor};
pub use network::{ArchitectureSpec, LayerSpec, Network};
pub use dataset::{ClassLabel, DatasetSplits, Sample};
pub use train::{train_loop, EpochStats, TrainConfig, TrainingHistory};
pub use eval::{evaluate, Evaluation};
pub use inference::{Classifier, ModelChoice, Prediction};
pub use explain::{Explainer, GeminiExplainer};
