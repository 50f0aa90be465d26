use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbImage;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SaliencyConfig;
use crate::error::{BrainScanError, Result};
use crate::explain::{Explainer, ExplanationRequest};
use crate::inference::predictor::{Classifier, Prediction};
use crate::saliency::{compute_saliency, SaliencyMap};

/// Outcome of the explanation step. A failed request does not fail the
/// analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum Explanation {
    Text(String),
    Unavailable(String),
    Disabled,
}

/// Everything produced for one uploaded scan.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub model: String,
    pub prediction: Prediction,
    /// The upload resized to the model input, as the saliency map is drawn
    /// over it.
    pub display: RgbImage,
    pub saliency: SaliencyMap,
    pub explanation: Explanation,
}

/// Load → preprocess → classify → saliency → explain.
pub fn analyze_bytes(
    classifier: &mut Classifier,
    image_bytes: &[u8],
    saliency: &SaliencyConfig,
    explainer: Option<&dyn Explainer>,
) -> Result<Analysis> {
    let image = image::load_from_memory(image_bytes)?;
    let size = classifier.loader.size;
    let display = image.resize_exact(size, size, FilterType::Nearest).to_rgb8();
    let input = classifier.loader.to_tensor(&image)?;

    let prediction = classifier.predict_tensor(&input)?;
    info!(
        "'{}' predicts {} ({:.2}%)",
        classifier.name(),
        prediction.label,
        prediction.confidence * 100.0
    );
    let map = compute_saliency(&mut classifier.network, &input, prediction.label.index(), &display, saliency)?;

    let explanation = match explainer {
        None => Explanation::Disabled,
        Some(explainer) => {
            let request = ExplanationRequest {
                overlay_png: map.png_bytes()?,
                label: prediction.label,
                confidence: prediction.confidence,
            };
            match explainer.explain(&request) {
                Ok(text) => Explanation::Text(text),
                Err(e) => {
                    warn!("explanation failed: {}", e);
                    Explanation::Unavailable(e.to_string())
                }
            }
        }
    };

    Ok(Analysis {
        model: classifier.name().to_string(),
        prediction,
        display,
        saliency: map,
        explanation,
    })
}

pub fn analyze_file(
    classifier: &mut Classifier,
    path: &Path,
    saliency: &SaliencyConfig,
    explainer: Option<&dyn Explainer>,
) -> Result<Analysis> {
    let bytes = std::fs::read(path).map_err(|e| BrainScanError::ImageLoad(path.to_path_buf(), e.to_string()))?;
    analyze_bytes(classifier, &bytes, saliency, explainer)
}

/// `<uuid>-<sanitized stem>.png`; only ASCII alphanumerics, `-` and `_`
/// survive sanitizing.
pub fn saliency_file_name(upload_name: &str) -> String {
    let stem = Path::new(upload_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let clean: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    let clean = if clean.is_empty() { "upload".to_string() } else { clean };
    format!("{}-{}.png", Uuid::new_v4(), clean)
}

/// Writes the overlay into `dir` under a fresh unique name and returns the path.
pub fn save_saliency(map: &SaliencyMap, dir: &Path, upload_name: &str) -> Result<PathBuf> {
    let path = dir.join(saliency_file_name(upload_name));
    map.save_png(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ArchitectureSpec, Network};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned(AtomicUsize);

    impl Explainer for Canned {
        fn explain(&self, request: &ExplanationRequest) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            assert!(!request.overlay_png.is_empty());
            Ok(format!("looks like {}", request.label))
        }
    }

    struct Failing;

    impl Explainer for Failing {
        fn explain(&self, _: &ExplanationRequest) -> Result<String> {
            Err(BrainScanError::Explain("offline".into()))
        }
    }

    fn classifier() -> Classifier {
        let spec = ArchitectureSpec::custom_cnn("tiny", 16, [2, 2, 2, 2]);
        Classifier::new(Network::from_spec(&spec, &mut ChaCha8Rng::seed_from_u64(13)).unwrap()).unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(40, 40, |x, y| image::Rgb([(x * 6) as u8, (y * 6) as u8, 128]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img).write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn analysis_runs_every_stage() {
        let mut c = classifier();
        let explainer = Canned(AtomicUsize::new(0));
        let a = analyze_bytes(&mut c, &png_bytes(), &SaliencyConfig::default(), Some(&explainer)).unwrap();
        assert_eq!(a.display.dimensions(), (16, 16));
        assert_eq!(a.saliency.overlay.dimensions(), (16, 16));
        assert_eq!(explainer.0.load(Ordering::SeqCst), 1);
        assert_eq!(a.explanation, Explanation::Text(format!("looks like {}", a.prediction.label)));
    }

    #[test]
    fn explainer_failure_is_reported_not_raised() {
        let mut c = classifier();
        let a = analyze_bytes(&mut c, &png_bytes(), &SaliencyConfig::default(), Some(&Failing)).unwrap();
        assert!(matches!(a.explanation, Explanation::Unavailable(ref m) if m.contains("offline")));
    }

    #[test]
    fn undecodable_upload_is_an_error() {
        let mut c = classifier();
        assert!(analyze_bytes(&mut c, b"plain text", &SaliencyConfig::default(), None).is_err());
    }

    #[test]
    fn saliency_names_are_unique_and_sanitized() {
        let a = saliency_file_name("../scan 01.jpg");
        let b = saliency_file_name("../scan 01.jpg");
        assert_ne!(a, b);
        assert!(a.ends_with("-scan_01.png"));
        assert!(!a.contains('/'));
        assert!(saliency_file_name("").ends_with("-upload.png"));
    }
}
