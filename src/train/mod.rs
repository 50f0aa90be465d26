pub mod epoch_stats;
pub mod history;
pub mod loop_fn;
pub mod session;
pub mod train_config;

pub use epoch_stats::EpochStats;
pub use history::{BestEpoch, Metric, TrainingHistory};
pub use loop_fn::train_loop;
pub use session::{build_spec, evaluate_splits, load_splits, train_model, TrainingOutcome};
pub use train_config::TrainConfig;
