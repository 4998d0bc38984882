use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use thumbpro_contracts::{EditorError, ImageRef};

use super::{
    EditGateway, EditRequest, EditResult, SuggestionRequest, DEFAULT_CAPTION,
    MAX_SUGGESTIONS, MAX_SUGGESTION_WORDS, THUMBNAIL_ASPECT_RATIO,
};
use crate::config::{gemini_api_key, EditorConfig};

const THUMBNAIL_DESIGNER_INSTRUCTION: &str = "You are an elite YouTube Thumbnail Designer. Your goal is to create or edit images that are:
1. High-impact and click-worthy (not clickbait, but visually arresting).
2. Extremely vibrant with high color saturation and contrast.
3. Feature cinematic lighting (rim lights, glows, bokeh).
4. Optimized for the 16:9 aspect ratio.
5. Focused on a clear subject with a compelling background.

When editing an existing image:
- If asked to \"remove background\", replace it with a clean, high-contrast studio background or a thematic environment.
- If asked to \"put me in [place]\", seamlessly blend the subject into that environment with matching lighting.
- Ensure the subject remains sharp and the focal point.";

pub struct GeminiGateway {
    api_base: String,
    image_model: String,
    text_model: String,
    timeout_s: f64,
    http: HttpClient,
}

impl GeminiGateway {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            image_model: config.image_model.clone(),
            text_model: config.text_model.clone(),
            timeout_s: config.request_timeout_s,
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn edit_prompt(request: &EditRequest) -> String {
        if request.source_image.is_some() {
            format!(
                "TASK: Edit the provided image based on this request: \"{}\". Maintain the subject's identity but transform the style to be a viral YouTube thumbnail.\n\n{THUMBNAIL_DESIGNER_INSTRUCTION}",
                request.prompt
            )
        } else {
            format!(
                "TASK: Generate a brand new YouTube thumbnail from scratch: \"{}\".\n\n{THUMBNAIL_DESIGNER_INSTRUCTION}",
                request.prompt
            )
        }
    }

    fn build_edit_payload(request: &EditRequest) -> Value {
        let mut parts = Vec::new();
        if let Some(source) = request.source_image.as_ref() {
            parts.push(inline_image_part(source));
        }
        parts.push(json!({ "text": Self::edit_prompt(request) }));
        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {
                    "aspectRatio": THUMBNAIL_ASPECT_RATIO,
                },
            },
        })
    }

    fn build_suggestion_payload(request: &SuggestionRequest) -> Value {
        let mut parts = Vec::new();
        if let Some(image) = request.current_image.as_ref() {
            parts.push(inline_image_part(image));
        }
        let context = match request.last_prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => format!("The last requested edit was: \"{prompt}\". "),
            _ => String::new(),
        };
        parts.push(json!({
            "text": format!(
                "{context}Suggest up to {MAX_SUGGESTIONS} next edits that would make this YouTube thumbnail more compelling. Each suggestion must be at most {MAX_SUGGESTION_WORDS} words. Reply with a JSON array of strings only."
            ),
        }));
        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
            },
        })
    }

    fn post(&self, endpoint: &str, payload: &Value) -> Result<Value, EditorError> {
        let Some(api_key) = gemini_api_key() else {
            return Err(EditorError::generation_failed(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set",
            ));
        };
        let response = self
            .http
            .post(endpoint)
            .query(&[("key", api_key.as_str())])
            .timeout(Duration::from_secs_f64(self.timeout_s))
            .json(payload)
            .send()
            .map_err(|err| EditorError::generation_failed(format!("Gemini request failed: {err}")))?;

        let code = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| EditorError::generation_failed(format!("Gemini response body read failed: {err}")))?;
        if !(200..300).contains(&code) {
            return Err(classify_failure(code, &body));
        }
        serde_json::from_str(&body)
            .map_err(|_| EditorError::generation_failed("Gemini returned invalid JSON payload"))
    }
}

impl EditGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    fn edit_or_generate(&self, request: &EditRequest) -> Result<EditResult, EditorError> {
        let endpoint = self.endpoint_for_model(&self.image_model);
        let payload = Self::build_edit_payload(request);
        tracing::debug!(
            model = %self.image_model,
            has_source = request.source_image.is_some(),
            "sending Gemini edit request"
        );
        let response = self.post(&endpoint, &payload)?;
        extract_edit_result(&response)
    }

    fn suggest_next_edits(&self, request: &SuggestionRequest) -> anyhow::Result<Vec<String>> {
        let endpoint = self.endpoint_for_model(&self.text_model);
        let payload = Self::build_suggestion_payload(request);
        let response = self.post(&endpoint, &payload)?;
        extract_suggestions(&response)
    }
}

fn inline_image_part(image: &ImageRef) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type(),
            "data": image.base64_payload(),
        }
    })
}

fn classify_failure(code: u16, body: &str) -> EditorError {
    if code == 429 || body.contains("RESOURCE_EXHAUSTED") {
        return EditorError::RateLimited;
    }
    EditorError::generation_failed(format!(
        "Gemini request failed ({code}): {}",
        truncate_text(body, 512)
    ))
}

fn response_parts(payload: &Value) -> Vec<Map<String, Value>> {
    payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(Value::as_object)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Last inline image wins as the frame, last text part as the caption.
fn extract_edit_result(payload: &Value) -> Result<EditResult, EditorError> {
    let mut image = None;
    let mut caption = None;
    for part in response_parts(payload) {
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object);
        if let Some(inline) = inline {
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                EditorError::generation_failed(format!("Gemini image base64 decode failed: {err}"))
            })?;
            let mime = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .filter(|value| value.starts_with("image/"))
                .unwrap_or("image/png");
            image = Some(ImageRef::from_bytes(mime, &bytes));
        } else if let Some(text) = part.get("text").and_then(Value::as_str) {
            if !text.trim().is_empty() {
                caption = Some(text.trim().to_string());
            }
        }
    }

    let Some(image) = image else {
        return Err(EditorError::no_image_returned());
    };
    Ok(EditResult {
        image,
        caption: caption.unwrap_or_else(|| DEFAULT_CAPTION.to_string()),
    })
}

fn extract_suggestions(payload: &Value) -> anyhow::Result<Vec<String>> {
    let text = response_parts(payload)
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<&str>>()
        .join("");
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    let parsed: Value =
        serde_json::from_str(unfenced).context("Gemini suggestions were not valid JSON")?;
    let items = parsed
        .as_array()
        .context("Gemini suggestions were not a JSON array")?;
    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
