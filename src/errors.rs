use thiserror::Error;

/// Failures surfaced by the analysis and render pipelines.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{0} is not configured")]
    MissingCredential(&'static str),

    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Model response violated the analysis schema: {0}")]
    SchemaViolation(String),

    #[error("No image was generated by the model: {0}")]
    NoImageProduced(String),

    #[error("Invalid image input: {0}")]
    InvalidImage(String),
}

impl PipelineError {
    /// Short label used in timing and status logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MissingCredential(_) => "missing_credential",
            PipelineError::ModelCall(_) => "model_call",
            PipelineError::SchemaViolation(_) => "schema_violation",
            PipelineError::NoImageProduced(_) => "no_image_produced",
            PipelineError::InvalidImage(_) => "invalid_image",
        }
    }
}
