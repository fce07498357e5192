pub mod gemini;
pub mod media;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::PipelineError;

pub use gemini::{GeminiClient, GeminiResponse};
pub use media::{load_image, ImageInput};

/// A service that answers `generateContent` requests.
///
/// [`GeminiClient`] talks to the hosted API; tests substitute canned responders.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        payload: Value,
    ) -> Result<GeminiResponse, PipelineError>;
}
