//! End-to-end: index a small synthetic dataset, train both architectures,
//! reload the artifacts and analyze an image.

use std::path::Path;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use brainscan::config::AppConfig;
use brainscan::dataset::{class_counts, index_directory};
use brainscan::inference::{analyze_file, save_saliency, Classifier, Explanation, ModelChoice};
use brainscan::train::{train_model, TrainingHistory};
use brainscan::ClassLabel;

const SIZE: u32 = 16;

/// Class `k` is a bright square in quadrant `k` on a dark background.
fn write_scan(path: &Path, class: usize, variant: u8) {
    let (qx, qy) = ((class % 2) as u32 * SIZE / 2, (class / 2) as u32 * SIZE / 2);
    let img = RgbImage::from_fn(SIZE, SIZE, |x, y| {
        let inside = x >= qx && x < qx + SIZE / 2 && y >= qy && y < qy + SIZE / 2;
        let v = if inside { 200 + variant } else { 10 + variant };
        Rgb([v, v, v])
    });
    img.save(path).unwrap();
}

fn write_split(root: &Path, per_class: usize) {
    for (k, dir) in ["glioma", "meningioma", "notumor", "pituitary"].iter().enumerate() {
        let class_dir = root.join(dir);
        std::fs::create_dir_all(&class_dir).unwrap();
        for i in 0..per_class {
            write_scan(&class_dir.join(format!("{}_{}.png", dir, i)), k, i as u8);
        }
    }
}

fn config_in(tmp: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.data.train_dir = tmp.path().join("Training");
    config.data.holdout_dir = tmp.path().join("Testing");
    config.training.epochs = 2;
    config.training.cnn_batch_size = 4;
    config.training.transfer_batch_size = 4;
    config.training.cnn_image_size = SIZE as usize;
    config.training.cnn_filters = [2, 2, 2, 2];
    config.models.dir = tmp.path().join("models");
    config.saliency.output_dir = tmp.path().join("saliency");
    config.saliency.mask_margin = 1.0;
    config.saliency.blur_kernel = 3;
    config
}

#[test]
fn indexer_counts_every_image() {
    let tmp = TempDir::new().unwrap();
    write_split(&tmp.path().join("Training"), 3);
    std::fs::write(tmp.path().join("Training/glioma/notes.txt"), "not an image").unwrap();

    let samples = index_directory(&tmp.path().join("Training")).unwrap();
    assert_eq!(samples.len(), 12);
    assert_eq!(class_counts(&samples), [3, 3, 3, 3]);
    for s in &samples {
        let parent = s.path.parent().unwrap().file_name().unwrap().to_string_lossy();
        assert_eq!(parent, s.class_name);
        assert_eq!(s.class_name.parse::<ClassLabel>().unwrap(), s.label);
    }
}

#[test]
fn train_reload_and_analyze() {
    let tmp = TempDir::new().unwrap();
    write_split(&tmp.path().join("Training"), 3);
    write_split(&tmp.path().join("Testing"), 2);
    let config = config_in(&tmp);

    let cnn = train_model(&config, ModelChoice::CustomCnn, None).unwrap();
    assert!(cnn.model_path.is_file());
    assert!(cnn.chart_path.is_file());
    assert_eq!(cnn.history.epochs.len(), 2);
    let names: Vec<&str> = cnn.evaluations.iter().map(|e| e.split.as_str()).collect();
    assert_eq!(names, ["train", "validation", "test"]);
    assert_eq!(cnn.evaluations[2].confusion.total(), 4);
    for eval in &cnn.evaluations {
        assert!(eval.metrics.loss.is_finite());
        assert!((0.0..=1.0).contains(&eval.metrics.accuracy));
    }

    let reloaded = TrainingHistory::load_json(&cnn.history_path).unwrap();
    assert_eq!(reloaded.epochs.len(), cnn.history.epochs.len());

    // The trained CNN doubles as the transfer model's backbone.
    let transfer = train_model(&config, ModelChoice::Transfer, Some(&cnn.model_path)).unwrap();
    assert_eq!(
        transfer.model_path,
        config.models.artifact_path(&config.models.transfer_name)
    );

    let mut classifier = Classifier::load(&transfer.model_path).unwrap();
    let scan = tmp.path().join("Testing/pituitary/pituitary_0.png");
    let analysis = analyze_file(&mut classifier, &scan, &config.saliency, None).unwrap();

    let total: f64 = analysis.prediction.probabilities.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(analysis.explanation, Explanation::Disabled);
    assert_eq!(analysis.saliency.overlay.dimensions(), (SIZE, SIZE));
    assert!(analysis.saliency.intensity.iter().all(|v| (0.0..=1.0).contains(v)));

    let a = save_saliency(&analysis.saliency, &config.saliency.output_dir, "pituitary_0.png").unwrap();
    let b = save_saliency(&analysis.saliency, &config.saliency.output_dir, "pituitary_0.png").unwrap();
    assert_ne!(a, b);
    assert!(a.is_file() && b.is_file());
}

#[test]
fn unreadable_upload_is_an_error() {
    let tmp = TempDir::new().unwrap();
    write_split(&tmp.path().join("Training"), 2);
    write_split(&tmp.path().join("Testing"), 2);
    let mut config = config_in(&tmp);
    config.training.epochs = 1;

    let outcome = train_model(&config, ModelChoice::CustomCnn, None).unwrap();
    let mut classifier = Classifier::load(&outcome.model_path).unwrap();
    let bogus = tmp.path().join("bogus.png");
    std::fs::write(&bogus, b"not a png").unwrap();
    assert!(analyze_file(&mut classifier, &bogus, &config.saliency, None).is_err());
    assert!(analyze_file(&mut classifier, &tmp.path().join("missing.png"), &config.saliency, None).is_err());
}
