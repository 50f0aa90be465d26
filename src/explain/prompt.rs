use crate::dataset::ClassLabel;

/// Instruction sent alongside the saliency overlay.
pub fn explanation_prompt(label: ClassLabel, confidence: f64) -> String {
    format!(
        "You are an expert neurologist. You are tasked with explaining a saliency map of a brain tumor MRI scan \
as either glioma, meningioma, pituitary, or no tumor.

The saliency map highlights the regions of the image that the machine learning model is focusing on to make the prediction.

The deep learning model predicted the image to be of class '{}' with a confidence of {:.2}%.

In your response:
- Explain what regions of the brain the model is focusing on, based on the saliency map. Refer to the regions highlighted in light cyan, \
those are the regions where the model is focusing on.
- Explain possible reasons why the model made the prediction it did.
- Don't mention anything like 'The saliency map highlights the regions the model is focusing on, which are in light cyan' \
in your explanation.
- Keep your explanation to 4 sentences max.

Let's think step by step about this. Verify step by step.
",
        label.display_name(),
        confidence * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_class_and_percentage() {
        let p = explanation_prompt(ClassLabel::NoTumor, 0.8734);
        assert!(p.contains("class 'No Tumor'"));
        assert!(p.contains("87.34%"));
        assert!(p.contains("4 sentences max"));
    }
}
