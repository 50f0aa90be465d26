//! Natural-language explanations of saliency overlays.

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiExplainer;
pub use prompt::explanation_prompt;

use crate::dataset::ClassLabel;
use crate::error::Result;

/// What an explainer is shown: the overlay image and the prediction it
/// belongs to.
#[derive(Debug, Clone)]
pub struct ExplanationRequest {
    pub overlay_png: Vec<u8>,
    pub label: ClassLabel,
    /// Probability of `label`, in [0, 1].
    pub confidence: f64,
}

/// A service that turns a saliency overlay into free text.
pub trait Explainer: Send + Sync {
    fn explain(&self, request: &ExplanationRequest) -> Result<String>;
}
