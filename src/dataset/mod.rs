//! Dataset indexing, splitting and image preprocessing.

pub mod augment;
pub mod indexer;
pub mod label;
pub mod loader;
pub mod source;
pub mod split;

pub use augment::BrightnessJitter;
pub use indexer::{class_counts, index_directory, Sample};
pub use label::ClassLabel;
pub use loader::ImageLoader;
pub use source::{ImageSet, SampleSource};
pub use split::{stratified_split, DatasetSplits};
