use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::dataset::indexer::{class_counts, index_directory, Sample};
use crate::dataset::label::ClassLabel;
use crate::error::{BrainScanError, Result};

/// Splits `samples` per class: `round(n * fraction)` of each class go to the
/// first part, the rest to the second. Deterministic for a given seed.
pub fn stratified_split(samples: &[Sample], fraction: f64, seed: u64) -> Result<(Vec<Sample>, Vec<Sample>)> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(BrainScanError::Dataset(format!(
            "split fraction must be in [0, 1], got {}",
            fraction
        )));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut first = Vec::new();
    let mut second = Vec::new();

    for label in ClassLabel::ALL {
        let mut class: Vec<Sample> = samples.iter().filter(|s| s.label == label).cloned().collect();
        class.shuffle(&mut rng);
        let take = (class.len() as f64 * fraction).round() as usize;
        let rest = class.split_off(take.min(class.len()));
        first.extend(class);
        second.extend(rest);
    }
    Ok((first, second))
}

/// Train / validation / test partition of the dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplits {
    pub train: Vec<Sample>,
    pub valid: Vec<Sample>,
    pub test: Vec<Sample>,
}

impl DatasetSplits {
    /// The training tree becomes the train split. The holdout tree is split
    /// stratified into validation (`valid_fraction`) and test.
    pub fn from_roots(train_root: &Path, holdout_root: &Path, valid_fraction: f64, seed: u64) -> Result<Self> {
        let train = index_directory(train_root)?;
        let holdout = index_directory(holdout_root)?;
        let (valid, test) = stratified_split(&holdout, valid_fraction, seed)?;
        let splits = DatasetSplits { train, valid, test };
        info!(
            "splits: train {} {:?}, valid {} {:?}, test {} {:?}",
            splits.train.len(),
            class_counts(&splits.train),
            splits.valid.len(),
            class_counts(&splits.valid),
            splits.test.len(),
            class_counts(&splits.test),
        );
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn samples(per_class: [usize; 4]) -> Vec<Sample> {
        let mut out = Vec::new();
        for (label, n) in ClassLabel::ALL.iter().zip(per_class) {
            for i in 0..n {
                out.push(Sample {
                    path: PathBuf::from(format!("{}/{}.jpg", label.name(), i)),
                    class_name: label.name().into(),
                    label: *label,
                });
            }
        }
        out
    }

    #[test]
    fn proportions_follow_fraction_per_class() {
        let all = samples([300, 306, 405, 300]);
        let (valid, test) = stratified_split(&all, 0.5, 42).unwrap();
        assert_eq!(valid.len() + test.len(), all.len());
        assert_eq!(class_counts(&valid), [150, 153, 203, 150]);
        assert_eq!(class_counts(&test), [150, 153, 202, 150]);
    }

    #[test]
    fn split_is_disjoint_and_seeded() {
        let all = samples([10, 10, 10, 10]);
        let (a1, b1) = stratified_split(&all, 0.3, 7).unwrap();
        let (a2, _) = stratified_split(&all, 0.3, 7).unwrap();
        assert_eq!(a1, a2);
        assert_eq!(class_counts(&a1), [3, 3, 3, 3]);
        assert!(a1.iter().all(|s| !b1.contains(s)));
    }

    #[test]
    fn rejects_fraction_outside_unit_interval() {
        assert!(stratified_split(&samples([1, 1, 1, 1]), 1.5, 0).is_err());
    }
}
