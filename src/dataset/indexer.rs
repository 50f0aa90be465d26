use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::dataset::label::ClassLabel;
use crate::error::Result;

/// File extensions treated as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

/// One labeled image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub path: PathBuf,
    /// Directory name the file was found under, e.g. `notumor`.
    pub class_name: String,
    pub label: ClassLabel,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Builds the sample table for a `root/<class>/<image>` tree.
///
/// Image files are not decoded here; a corrupt file only fails when loaded.
/// A missing root yields an empty table.
pub fn index_directory(root: &Path) -> Result<Vec<Sample>> {
    if !root.is_dir() {
        warn!("dataset directory {:?} does not exist, no samples indexed", root);
        return Ok(Vec::new());
    }

    let mut samples = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let class_name = entry.file_name().to_string_lossy().into_owned();
        let label: ClassLabel = match class_name.parse() {
            Ok(label) => label,
            Err(_) => {
                warn!("skipping directory {:?}: not a known class", entry.path());
                continue;
            }
        };

        let before = samples.len();
        for file in WalkDir::new(entry.path())
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
        {
            samples.push(Sample {
                path: file.into_path(),
                class_name: class_name.clone(),
                label,
            });
        }
        debug!("class '{}': {} images", class_name, samples.len() - before);
    }

    samples.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.path.cmp(&b.path)));
    if samples.is_empty() {
        warn!("no images found under {:?}", root);
    } else {
        info!("indexed {} images under {:?}", samples.len(), root);
    }
    Ok(samples)
}

/// Number of samples per class, indexed by `ClassLabel::index`.
pub fn class_counts(samples: &[Sample]) -> [usize; ClassLabel::COUNT] {
    let mut counts = [0; ClassLabel::COUNT];
    for sample in samples {
        counts[sample.label.index()] += 1;
    }
    counts
}
