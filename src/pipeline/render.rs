use std::fmt;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::llm::gemini::truncate_for_log;
use crate::llm::{GeminiResponse, GenerativeBackend, ImageInput};
use crate::pipeline::aspect_ratio::AspectRatio;
use crate::pipeline::prompts::{
    push_override, FACE_REFERENCE_LABEL, POSE_SOURCE_LABEL, PROMPT_VERSION, RENDER_ABSTRACT_STYLE,
    RENDER_BASE, RENDER_DETAILED_STYLE, RENDER_DIRECT_IDENTITY, RENDER_FACE_SWAP_IDENTITY,
    RENDER_OVERRIDE_HEADER,
};
use crate::utils::timing::log_model_timing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderVariant {
    /// Likeness-preserving line art.
    Detailed,
    /// Featureless mannequin for pose reference.
    Abstract,
}

impl RenderVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderVariant::Detailed => "detailed",
            RenderVariant::Abstract => "abstract",
        }
    }

    fn style_prompt(self) -> &'static str {
        match self {
            RenderVariant::Detailed => RENDER_DETAILED_STYLE,
            RenderVariant::Abstract => RENDER_ABSTRACT_STYLE,
        }
    }
}

impl fmt::Display for RenderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub variant: RenderVariant,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub detailed: RenderedImage,
    pub r#abstract: RenderedImage,
}

/// Inputs for one render call, borrowed for the duration of the request.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub pose_image: &'a ImageInput,
    pub face_image: Option<&'a ImageInput>,
    pub aspect_ratio: AspectRatio,
    pub variant: RenderVariant,
    pub instructions: &'a str,
}

#[derive(Debug, Clone)]
pub struct RenderRequestBuilder {
    model: String,
}

impl RenderRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Identity framing, then style, then the user's override last.
    pub fn instruction_text(&self, request: &RenderRequest<'_>) -> String {
        let identity = if request.face_image.is_some() {
            RENDER_FACE_SWAP_IDENTITY
        } else {
            RENDER_DIRECT_IDENTITY
        };
        let mut sections = vec![
            RENDER_BASE.to_string(),
            identity.to_string(),
            request.variant.style_prompt().to_string(),
        ];
        push_override(&mut sections, RENDER_OVERRIDE_HEADER, request.instructions);
        sections.join("\n\n")
    }

    pub fn build_payload(&self, request: &RenderRequest<'_>) -> Value {
        let mut parts = Vec::new();
        match request.face_image {
            Some(face) => {
                parts.push(json!({ "text": POSE_SOURCE_LABEL }));
                parts.push(request.pose_image.inline_part());
                parts.push(json!({ "text": FACE_REFERENCE_LABEL }));
                parts.push(face.inline_part());
            }
            None => parts.push(request.pose_image.inline_part()),
        }
        parts.push(json!({ "text": self.instruction_text(request) }));

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": request.aspect_ratio.as_str() }
            }
        })
    }

    pub fn extract_image(
        &self,
        variant: RenderVariant,
        response: &GeminiResponse,
    ) -> Result<RenderedImage, PipelineError> {
        if let Some(image) = response.first_image() {
            return Ok(RenderedImage {
                variant,
                mime_type: image.mime_type,
                bytes: image.bytes,
            });
        }

        let text = response.text();
        let detail = if text.trim().is_empty() {
            format!(
                "model {} returned no image (finish reason: {})",
                self.model,
                response.finish_reason().unwrap_or("unknown")
            )
        } else {
            format!(
                "model {} replied with text instead: {}",
                self.model,
                truncate_for_log(&text, 200)
            )
        };
        warn!("Render {} produced no image: {}", variant, detail);
        Err(PipelineError::NoImageProduced(detail))
    }

    pub async fn render(
        &self,
        backend: &dyn GenerativeBackend,
        request: RenderRequest<'_>,
    ) -> Result<RenderedImage, PipelineError> {
        let payload = self.build_payload(&request);
        let metadata = json!({
            "prompt_version": PROMPT_VERSION,
            "variant": request.variant.as_str(),
            "aspect_ratio": request.aspect_ratio.as_str(),
            "face_reference": request.face_image.is_some(),
            "has_instructions": !request.instructions.trim().is_empty(),
        });
        let operation = format!("render_{}", request.variant);

        log_model_timing("gemini", &self.model, &operation, Some(metadata), || async {
            let response = backend.generate_content(&self.model, payload).await?;
            let image = self.extract_image(request.variant, &response)?;
            info!(
                "Render {} complete: mime={} bytes={}",
                image.variant,
                image.mime_type,
                image.bytes.len()
            );
            Ok::<_, PipelineError>(image)
        })
        .await
    }
}
