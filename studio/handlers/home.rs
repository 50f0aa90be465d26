use brainscan::inference::ModelChoice;

use crate::render::{html_escape, render_page};
use crate::routes::{html_response, HttpResponse};
use crate::state::DemoState;

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

pub fn handle_get(state: &DemoState) -> HttpResponse {
    html_response(build_page(state, ModelChoice::Transfer, ""))
}

/// The upload page with `selected` checked and `result_html` below the form.
pub fn build_page(state: &DemoState, selected: ModelChoice, result_html: &str) -> String {
    let choices = model_choices_html(state, selected);
    let status = if state.explainer.is_some() {
        "Explanations are generated by the Gemini API from the saliency map.".to_string()
    } else {
        format!(
            "Explanations are off. Set {} (or add it to .env) to enable them.",
            html_escape(&state.config.explain.api_key_env)
        )
    };
    render_page(|html| {
        html.replace("{{MODEL_CHOICES}}", &choices)
            .replace("{{EXPLAIN_STATUS}}", &status)
            .replace("{{RESULT}}", result_html)
    })
}

fn model_choices_html(state: &DemoState, selected: ModelChoice) -> String {
    ModelChoice::ALL
        .iter()
        .map(|&choice| {
            let available = state.is_available(choice);
            format!(
                r#"<label class="choice{missing}"><input type="radio" name="model" value="{key}"{checked}> {title}{note}</label>"#,
                missing = if available { "" } else { " missing" },
                key = choice.key(),
                checked = if choice == selected { " checked" } else { "" },
                title = html_escape(choice.title()),
                note = if available { "" } else { " (not trained)" },
            )
        })
        .collect()
}
