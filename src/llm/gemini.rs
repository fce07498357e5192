use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::PipelineError;
use crate::llm::GenerativeBackend;
use crate::utils::http::get_http_client;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiContent {
    pub parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
        /// Set on reasoning summaries, which are not part of the answer.
        #[serde(default)]
        thought: bool,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    pub mime_type: String,
    pub data: String,
}

/// An image part decoded out of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl GeminiResponse {
    #[cfg(test)]
    pub(crate) fn from_parts(parts: Vec<GeminiPart>) -> Self {
        GeminiResponse {
            candidates: Some(vec![GeminiCandidate {
                content: Some(GeminiContent { parts: Some(parts) }),
                finish_reason: Some("STOP".to_string()),
            }]),
        }
    }

    /// Parts of the first candidate; later candidates are never read.
    fn parts(&self) -> impl Iterator<Item = &GeminiPart> {
        self.candidates
            .as_deref()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.content.as_ref())
            .and_then(|content| content.parts.as_deref())
            .unwrap_or(&[])
            .iter()
    }

    /// Concatenated non-blank answer text, skipping thought parts.
    pub fn text(&self) -> String {
        let mut text_parts = Vec::new();
        for part in self.parts() {
            if let GeminiPart::Text {
                text,
                thought: false,
            } = part
            {
                if !text.trim().is_empty() {
                    text_parts.push(text.as_str());
                }
            }
        }
        text_parts.join("\n")
    }

    /// First inline `image/*` part whose payload decodes.
    pub fn first_image(&self) -> Option<InlineImage> {
        for part in self.parts() {
            if let GeminiPart::InlineData { inline_data } = part {
                if !inline_data.mime_type.starts_with("image/") {
                    continue;
                }
                match general_purpose::STANDARD.decode(inline_data.data.trim()) {
                    Ok(bytes) if !bytes.is_empty() => {
                        return Some(InlineImage {
                            mime_type: inline_data.mime_type.clone(),
                            bytes,
                        })
                    }
                    Ok(_) => warn!("Skipping empty inline image part"),
                    Err(err) => warn!("Skipping undecodable inline image part: {err}"),
                }
            }
        }
        None
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .find_map(|candidate| candidate.finish_reason.as_deref())
    }
}

pub(crate) fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

pub(crate) fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

pub(crate) fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        let mut config = config.clone();
        // The schema is large and static; keep only whether one was sent.
        if let Some(object) = config.as_object_mut() {
            if object.remove("responseSchema").is_some() {
                object.insert("responseSchema".to_string(), json!("<schema>"));
            }
        }
        summary.insert("generationConfig".to_string(), config);
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut thought_parts = 0usize;
    let mut image_parts = 0usize;
    let mut other_parts = Vec::new();
    let mut text_preview = None;

    for part in response.parts() {
        match part {
            GeminiPart::Text { thought: true, .. } => thought_parts += 1,
            GeminiPart::Text { text, .. } => {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
            GeminiPart::InlineData { inline_data } => {
                if inline_data.mime_type.starts_with("image/") {
                    image_parts += 1;
                }
            }
            GeminiPart::Other(value) => {
                let kind = value
                    .as_object()
                    .and_then(|object| object.keys().next().cloned())
                    .unwrap_or_else(|| "unknown".to_string());
                other_parts.push(kind);
            }
        }
    }

    json!({
        "candidates": response.candidates.as_ref().map(|candidates| candidates.len()).unwrap_or(0),
        "finishReason": response.finish_reason(),
        "textParts": text_parts,
        "thoughtParts": thought_parts,
        "imageParts": image_parts,
        "otherParts": other_parts,
        "textPreview": text_preview
    })
}

pub(crate) fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

/// REST client for `models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    request_timeout: Duration,
    safety_profile: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        let api_key = config.gemini_api_key.trim();
        if api_key.is_empty() {
            return Err(PipelineError::MissingCredential("GEMINI_API_KEY"));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: config.gemini_base_url.clone(),
            request_timeout: config.gemini_request_timeout,
            safety_profile: config.gemini_safety_settings.clone(),
        })
    }

    fn redact(&self, text: &str) -> String {
        text.replace(&self.api_key, "[redacted]")
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model.trim())
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        mut payload: Value,
    ) -> Result<GeminiResponse, PipelineError> {
        if let Some(object) = payload.as_object_mut() {
            object
                .entry("safetySettings")
                .or_insert_with(|| Value::Array(build_safety_settings(&self.safety_profile)));
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(&payload);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let response = get_http_client()
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status()
                );
                PipelineError::ModelCall(err_text)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "Gemini API error: status={}, body={}",
                status,
                self.redact(&body_summary)
            );
            let detail = self.redact(&message.unwrap_or(body_summary));
            return Err(PipelineError::ModelCall(format!(
                "status {}: {}",
                status, detail
            )));
        }

        let value = response
            .json::<GeminiResponse>()
            .await
            .map_err(|err| PipelineError::ModelCall(self.redact(&err.to_string())))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::test_config;

    pub(crate) fn text_response(text: &str) -> GeminiResponse {
        GeminiResponse::from_parts(vec![GeminiPart::Text {
            text: text.to_string(),
            thought: false,
        }])
    }

    pub(crate) fn image_response(mime_type: &str, bytes: &[u8]) -> GeminiResponse {
        GeminiResponse::from_parts(vec![
            GeminiPart::Text {
                text: "Here is the drawing.".to_string(),
                thought: false,
            },
            GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: mime_type.to_string(),
                    data: general_purpose::STANDARD.encode(bytes),
                },
            },
        ])
    }

    #[test]
    fn client_requires_an_api_key() {
        let err = GeminiClient::new(&test_config("  ")).unwrap_err();
        assert_eq!(err, PipelineError::MissingCredential("GEMINI_API_KEY"));

        let client = GeminiClient::new(&test_config("secret-key")).unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash"),
            "https://example.invalid/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            client.redact("bad key secret-key in url"),
            "bad key [redacted] in url"
        );
    }

    #[test]
    fn deserializes_mixed_parts_and_picks_first_image() {
        let raw = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "thinking", "thought": true },
                    { "functionCall": { "name": "noop" } },
                    { "text": "Here you go." },
                    { "inlineData": { "mimeType": "text/plain", "data": "aGVsbG8=" } },
                    { "inlineData": { "mimeType": "image/png", "data": "AQID" } },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "BAUG" } }
                ]},
                "finishReason": "STOP"
            }]
        });
        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let image = response.first_image().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, vec![1, 2, 3]);
        assert_eq!(response.text(), "Here you go.");
        assert_eq!(response.finish_reason(), Some("STOP"));

        let summary = summarize_gemini_response(&response);
        assert_eq!(summary["thoughtParts"], 1);
        assert_eq!(summary["textParts"], 1);
        assert_eq!(summary["imageParts"], 2);
        assert_eq!(summary["otherParts"], json!(["functionCall"]));
    }

    #[test]
    fn answer_text_skips_thoughts_and_later_candidates() {
        let raw = json!({
            "candidates": [
                { "content": { "parts": [
                    { "text": "**Considering the pose**", "thought": true },
                    { "text": "{\"ok\":true}" }
                ]}},
                { "content": { "parts": [{ "text": "second candidate" }] } }
            ]
        });
        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.text(), "{\"ok\":true}");
    }

    #[test]
    fn text_only_response_has_no_image() {
        let response = text_response("I can't draw that.");
        assert!(response.first_image().is_none());
        assert!(GeminiResponse::default().text().is_empty());
    }

    #[test]
    fn error_body_prefers_nested_message() {
        let (message, summary) =
            summarize_error_body(r#"{"error":{"code":400,"message":"API key not valid"}}"#);
        assert_eq!(message.as_deref(), Some("API key not valid"));
        assert!(summary.contains("400"));

        let (message, summary) = summarize_error_body("   ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");

        let (message, summary) = summarize_error_body("<html>bad gateway</html>");
        assert!(message.is_none());
        assert_eq!(summary, "<html>bad gateway</html>");
    }

    #[test]
    fn payload_summary_hides_image_data_and_schema() {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "QUJDRA==" } },
                { "text": "x".repeat(500) }
            ]}],
            "generationConfig": { "responseMimeType": "application/json", "responseSchema": { "type": "OBJECT" } },
            "safetySettings": build_safety_settings("standard"),
        });
        let summary = summarize_gemini_payload(&payload);
        assert_eq!(summary["contents"][0]["parts"][0]["inlineData"]["dataLen"], 8);
        assert!(summary["contents"][0]["parts"][1]["text"]
            .as_str()
            .unwrap()
            .ends_with("(truncated)"));
        assert_eq!(summary["generationConfig"]["responseSchema"], "<schema>");
        assert_eq!(summary["safetySettingsCount"], 5);
    }

    #[test]
    fn safety_profile_maps_to_threshold() {
        assert_eq!(build_safety_settings("standard")[0]["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
        assert_eq!(build_safety_settings("permissive")[4]["threshold"], "OFF");
    }
}
