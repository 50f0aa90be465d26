use std::io::Cursor;

use base64::Engine;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use tracing::{error, info};

use brainscan::inference::{analyze_bytes, save_saliency, Analysis, Explanation, ModelChoice};
use brainscan::{BrainScanError, Result};
use tiny_http::Request;

use crate::handlers::home::build_page;
use crate::render::html_escape;
use crate::routes::{html_response, HttpResponse};
use crate::state::DemoState;
use crate::util::multipart::{extract_boundary, extract_file, extract_text_field};

// ---------------------------------------------------------------------------
// POST /analyze
// ---------------------------------------------------------------------------

pub fn handle_post(request: &mut Request, state: &DemoState) -> HttpResponse {
    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_owned())
        .unwrap_or_default();

    let mut body = Vec::new();
    if let Err(e) = request.as_reader().read_to_end(&mut body) {
        return html_response(build_page(state, ModelChoice::Transfer, &error_html(&e.to_string())));
    }

    let boundary = extract_boundary(&content_type).unwrap_or_default();
    let choice = extract_text_field(&body, &boundary, "model")
        .and_then(|key| key.trim().parse::<ModelChoice>().ok())
        .unwrap_or(ModelChoice::Transfer);

    let result_html = match extract_file(&body, &boundary) {
        Some(file) if !file.bytes.is_empty() => match run_analysis(state, choice, &file.bytes, &file.filename) {
            Ok(html) => html,
            Err(e) => {
                error!("analysis of '{}' failed: {}", file.filename, e);
                error_html(&e.to_string())
            }
        },
        _ => error_html("No image file was uploaded."),
    };

    html_response(build_page(state, choice, &result_html))
}

fn run_analysis(state: &DemoState, choice: ModelChoice, bytes: &[u8], upload_name: &str) -> Result<String> {
    let shared = state.classifier(choice)?;
    let analysis = {
        let mut classifier = shared
            .lock()
            .map_err(|_| BrainScanError::Training(format!("{} model lock poisoned", choice)))?;
        analyze_bytes(&mut classifier, bytes, &state.config.saliency, state.explainer.as_deref())?
    };

    let saliency_path = save_saliency(&analysis.saliency, &state.config.saliency.output_dir, upload_name)?;
    let saliency_name = saliency_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("'{}' -> {} ({:?})", upload_name, analysis.prediction.label, saliency_path);

    Ok(result_html(choice, &analysis, &png_data_uri(&analysis.display)?, &saliency_name))
}

fn png_data_uri(image: &RgbImage) -> Result<String> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone()).write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(out.into_inner())
    ))
}

// ---------------------------------------------------------------------------
// Result rendering
// ---------------------------------------------------------------------------

fn result_html(choice: ModelChoice, analysis: &Analysis, original_uri: &str, saliency_name: &str) -> String {
    let prediction = &analysis.prediction;

    let rows: String = prediction
        .ranked()
        .into_iter()
        .map(|(label, p)| {
            let width = (p * 260.0) as u32;
            let dim = if label != prediction.label { " dim" } else { "" };
            format!(
                r#"<tr><td style="width:110px;font-weight:600;color:#333">{}</td><td><div class="bar-wrap"><div class="bar-fill{}" style="width:{}px"></div></div></td><td class="prob-pct">{:.2}%</td></tr>"#,
                html_escape(label.display_name()),
                dim,
                width,
                p * 100.0
            )
        })
        .collect();

    let explanation = match &analysis.explanation {
        Explanation::Text(text) => format!(r#"<div class="explanation">{}</div>"#, html_escape(text)),
        Explanation::Unavailable(reason) => format!(
            r#"<div class="explanation muted">Explanation unavailable: {}</div>"#,
            html_escape(reason)
        ),
        Explanation::Disabled => String::new(),
    };

    format!(
        r#"<div class="result-card"><h2>Result ({model})</h2>
<div class="prediction-hero">{hero}</div>
<div class="prediction-sub">Confidence: {conf:.2}%</div>
<table class="prob-table">
  <thead><tr><th>Class</th><th>Probability</th><th></th></tr></thead>
  <tbody>{rows}</tbody>
</table>
<div class="images">
  <figure><img src="{original}" alt="uploaded scan"><figcaption>Original</figcaption></figure>
  <figure><img src="/saliency/{saliency}" alt="saliency map"><figcaption>Saliency map</figcaption></figure>
</div>
{explanation}</div>"#,
        model = html_escape(choice.title()),
        hero = html_escape(prediction.label.display_name()),
        conf = prediction.confidence * 100.0,
        rows = rows,
        original = original_uri,
        saliency = html_escape(saliency_name),
        explanation = explanation,
    )
}

fn error_html(msg: &str) -> String {
    format!(
        r#"<div class="result-card"><h2>Error</h2><div class="error-box">{}</div></div>"#,
        html_escape(msg)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use brainscan::inference::Prediction;
    use brainscan::saliency::SaliencyMap;

    fn analysis(explanation: Explanation) -> Analysis {
        let display = RgbImage::new(4, 4);
        Analysis {
            model: "cnn_model".into(),
            prediction: Prediction::from_probabilities(vec![0.1, 0.2, 0.6, 0.1]).unwrap(),
            display: display.clone(),
            saliency: SaliencyMap { width: 4, height: 4, intensity: vec![0.0; 16], overlay: display },
            explanation,
        }
    }

    #[test]
    fn result_card_ranks_and_highlights_prediction() {
        let html = result_html(ModelChoice::CustomCnn, &analysis(Explanation::Disabled), "data:x", "a.png");
        assert!(html.contains("prediction-hero\">No Tumor"));
        let no_tumor = html.find(">No Tumor</td>").unwrap();
        let meningioma = html.find(">Meningioma</td>").unwrap();
        assert!(no_tumor < meningioma);
        assert_eq!(html.matches("bar-fill dim").count(), 3);
        assert!(html.contains("/saliency/a.png"));
        assert!(!html.contains("explanation"));
    }

    #[test]
    fn explanation_text_is_escaped() {
        let html = result_html(
            ModelChoice::Transfer,
            &analysis(Explanation::Text("<b>tumor</b>".into())),
            "data:x",
            "a.png",
        );
        assert!(html.contains("&lt;b&gt;tumor&lt;/b&gt;"));
        let unavailable = result_html(
            ModelChoice::Transfer,
            &analysis(Explanation::Unavailable("timeout".into())),
            "data:x",
            "a.png",
        );
        assert!(unavailable.contains("Explanation unavailable: timeout"));
    }

    #[test]
    fn data_uri_is_png() {
        let uri = png_data_uri(&RgbImage::new(2, 2)).unwrap();
        assert!(uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
