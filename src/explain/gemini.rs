//! Gemini `generateContent` client.
//!
//! - Auth via `?key=API_KEY` query parameter
//! - The prompt and the overlay PNG go in one user turn as a text part and
//!   an `inline_data` part
//! - No retries

use std::time::Duration;

use base64::Engine;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::ExplainConfig;
use crate::error::{BrainScanError, Result};
use crate::explain::prompt::explanation_prompt;
use crate::explain::{Explainer, ExplanationRequest};

pub struct GeminiExplainer {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiExplainer {
    /// Reads the API key from the environment variable named in `config`.
    pub fn from_config(config: &ExplainConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            BrainScanError::Explain(format!("environment variable '{}' is not set", config.api_key_env))
        })?;
        Self::with_key(config, api_key)
    }

    pub fn with_key(config: &ExplainConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(GeminiExplainer {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn build_request_body(prompt: &str, png: &[u8]) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": "image/png",
                            "data": base64::engine::general_purpose::STANDARD.encode(png),
                        }
                    }
                ]
            }]
        })
    }

    /// Concatenated text of the first candidate's parts.
    pub fn parse_response(body: &Value) -> Result<String> {
        let candidate = body["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| BrainScanError::Explain("response has no candidates".into()))?;
        let parts = candidate["content"]["parts"]
            .as_array()
            .ok_or_else(|| BrainScanError::Explain("candidate has no content parts".into()))?;
        Ok(parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""))
    }

    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> BrainScanError {
        match status.as_u16() {
            401 | 403 => BrainScanError::Explain("the API key was rejected".into()),
            429 => BrainScanError::Explain("rate limited by the explanation API".into()),
            _ => BrainScanError::Explain(format!("HTTP {} from explanation API: {}", status, body_text)),
        }
    }
}

impl Explainer for GeminiExplainer {
    fn explain(&self, request: &ExplanationRequest) -> Result<String> {
        let prompt = explanation_prompt(request.label, request.confidence);
        let body = Self::build_request_body(&prompt, &request.overlay_png);
        debug!(model = self.model.as_str(), bytes = request.overlay_png.len(), "sending explanation request");

        let response = self
            .client
            .post(self.endpoint_url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()?;
        let status = response.status();
        let body_text = response.text()?;
        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }
        let json: Value = serde_json::from_str(&body_text)?;
        Self::parse_response(&json)
    }
}
