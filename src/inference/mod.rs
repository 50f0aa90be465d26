pub mod pipeline;
pub mod predictor;

pub use pipeline::{analyze_bytes, analyze_file, save_saliency, saliency_file_name, Analysis, Explanation};
pub use predictor::{Classifier, ModelChoice, Prediction};
