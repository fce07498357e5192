use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::llm::gemini::truncate_for_log;
use crate::llm::ImageInput;
use crate::pipeline::models::{BilingualAnalysis, LanguageVariant};
use crate::utils::http::get_http_client;

/// Flat record accepted by the spreadsheet endpoint. The Japanese variant is
/// spread into the top level next to the summary and image fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub subject: String,
    pub category: String,
    pub keywords: String,
    pub detail: String,
    pub user_instructions: String,
    pub image_data: String,
    pub face_image_data: Option<String>,
    #[serde(flatten)]
    pub analysis: LanguageVariant,
}

#[derive(Serialize)]
struct SavePayload<'a> {
    secret: &'a str,
    #[serde(flatten)]
    request: &'a SaveRequest,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    status: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Success,
    Failure(String),
}

/// Non-empty values joined with commas; blanks leave no empty segment.
pub fn join_keywords<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn build_save_request(
    analysis: &BilingualAnalysis,
    original_image: &ImageInput,
    face_image: Option<&ImageInput>,
    instructions: &str,
) -> SaveRequest {
    let variant = &analysis.japanese;
    let keywords = join_keywords([
        variant.visual_style.vibe.as_str(),
        variant.visual_style.artistic_style.as_str(),
        variant.emotional_profile.emotion.as_str(),
        variant.scene.environment.as_str(),
    ]);

    SaveRequest {
        subject: variant.core_identity.age_gender.clone(),
        category: variant.visual_style.archetype.clone(),
        keywords,
        detail: variant.full_prompt.clone(),
        user_instructions: instructions.trim().to_string(),
        image_data: original_image.to_base64(),
        face_image_data: face_image.map(ImageInput::to_base64),
        analysis: variant.clone(),
    }
}

fn outcome_from_body(body: &str) -> SaveOutcome {
    match serde_json::from_str::<SaveResponse>(body.trim()) {
        Ok(response) if response.status.as_deref() == Some("success") => SaveOutcome::Success,
        Ok(response) => SaveOutcome::Failure(
            response
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "Unknown error from save endpoint".to_string()),
        ),
        Err(err) => SaveOutcome::Failure(format!(
            "Unreadable response from save endpoint: {err} (body: {})",
            truncate_for_log(body, 200)
        )),
    }
}

/// Posts once. No retry: a repeated submit creates a repeated record.
pub async fn submit(request: &SaveRequest, endpoint: &Url, secret: &str) -> SaveOutcome {
    let payload = SavePayload { secret, request };
    let response = match get_http_client()
        .post(endpoint.clone())
        .json(&payload)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!("Save request to {} failed: {}", endpoint.host_str().unwrap_or("?"), err);
            return SaveOutcome::Failure(err.to_string());
        }
    };

    let status = response.status();
    let outcome = match response.text().await {
        Ok(body) => outcome_from_body(&body),
        Err(err) => SaveOutcome::Failure(err.to_string()),
    };

    match &outcome {
        SaveOutcome::Success => info!("Saved analysis '{}' ({})", request.category, status),
        SaveOutcome::Failure(message) => {
            warn!("Save endpoint rejected record: status={} message={}", status, message)
        }
    }
    outcome
}
