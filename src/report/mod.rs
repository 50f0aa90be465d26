//! Training-history charts.

pub mod charts;

pub use charts::{save_training_chart, training_chart_svg};
