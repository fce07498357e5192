use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::llm::gemini::truncate_for_log;
use crate::llm::{GeminiResponse, GenerativeBackend, ImageInput};
use crate::pipeline::models::{bilingual_schema, BilingualAnalysis, LanguageVariant};
use crate::pipeline::prompts::{
    push_override, ANALYSIS_INTRO, ANALYSIS_OVERRIDE_HEADER, BEAUTY_FRAMING_POLICY,
    BILINGUAL_OUTPUT_RULES, EMOTIONAL_ARCHETYPES, PROMPT_VERSION, SCENE_FACTUALITY_POLICY,
};
use crate::utils::timing::log_model_timing;

/// Builds the schema-constrained "describe this photo" request and shapes its answer.
#[derive(Debug, Clone)]
pub struct AnalysisRequestBuilder {
    model: String,
    temperature: f32,
}

impl AnalysisRequestBuilder {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instruction_text(&self, instructions: &str) -> String {
        let mut sections = vec![ANALYSIS_INTRO.to_string()];
        push_override(&mut sections, ANALYSIS_OVERRIDE_HEADER, instructions);
        sections.push(BEAUTY_FRAMING_POLICY.to_string());
        sections.push(SCENE_FACTUALITY_POLICY.to_string());
        sections.push(EMOTIONAL_ARCHETYPES.to_string());
        sections.push(BILINGUAL_OUTPUT_RULES.to_string());
        sections.join("\n\n")
    }

    pub fn build_payload(&self, image: &ImageInput, instructions: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    image.inline_part(),
                    { "text": self.instruction_text(instructions) }
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json",
                "responseSchema": bilingual_schema(),
            }
        })
    }

    pub fn parse_response(&self, response: &GeminiResponse) -> Result<BilingualAnalysis, PipelineError> {
        let text = response.text();
        if text.trim().is_empty() {
            return Err(PipelineError::SchemaViolation(format!(
                "empty response (finish reason: {})",
                response.finish_reason().unwrap_or("unknown")
            )));
        }
        parse_bilingual_analysis(&text)
    }

    pub async fn analyze(
        &self,
        backend: &dyn GenerativeBackend,
        image: &ImageInput,
        instructions: &str,
    ) -> Result<BilingualAnalysis, PipelineError> {
        let payload = self.build_payload(image, instructions);
        let metadata = json!({
            "prompt_version": PROMPT_VERSION,
            "mime_type": image.mime_type,
            "image_bytes": image.bytes.len(),
            "has_instructions": !instructions.trim().is_empty(),
        });

        log_model_timing("gemini", &self.model, "analyze", Some(metadata), || async {
            let response = backend.generate_content(&self.model, payload).await?;
            let analysis = self.parse_response(&response)?;
            info!(
                "Analysis complete: archetype={:?} emotion={:?}",
                analysis.english.visual_style.archetype, analysis.english.emotional_profile.emotion
            );
            Ok::<_, PipelineError>(analysis)
        })
        .await
    }
}

fn check_full_prompt(language: &str, variant: &LanguageVariant) -> Result<(), PipelineError> {
    if variant.full_prompt.trim().is_empty() {
        return Err(PipelineError::SchemaViolation(format!(
            "{language}.fullPrompt is empty"
        )));
    }
    Ok(())
}

/// Strict parse: a missing or mistyped field is a contract violation, never defaulted.
pub fn parse_bilingual_analysis(text: &str) -> Result<BilingualAnalysis, PipelineError> {
    let analysis: BilingualAnalysis = serde_json::from_str(text.trim()).map_err(|err| {
        warn!(
            "Analysis response rejected: {} (body: {})",
            err,
            truncate_for_log(text, 300)
        );
        PipelineError::SchemaViolation(err.to_string())
    })?;
    check_full_prompt("japanese", &analysis.japanese)?;
    check_full_prompt("english", &analysis.english)?;
    Ok(analysis)
}
