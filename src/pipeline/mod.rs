pub mod analysis;
pub mod aspect_ratio;
pub mod models;
pub mod prompts;
pub mod render;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::errors::PipelineError;
use crate::llm::{GenerativeBackend, ImageInput};
use crate::state::Session;

pub use analysis::AnalysisRequestBuilder;
pub use aspect_ratio::AspectRatio;
pub use models::BilingualAnalysis;
pub use render::{RenderRequest, RenderRequestBuilder, RenderResult, RenderVariant, RenderedImage};

/// Outcome of one analyze action. The two pipelines report independently.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub generation: u64,
    pub aspect_ratio: AspectRatio,
    pub analysis: Result<BilingualAnalysis, PipelineError>,
    pub renders: Result<RenderResult, PipelineError>,
}

/// Runs the analysis and the render pair for one source image.
#[derive(Clone)]
pub struct Studio {
    backend: Arc<dyn GenerativeBackend>,
    analysis: AnalysisRequestBuilder,
    render: RenderRequestBuilder,
}

impl Studio {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        analysis: AnalysisRequestBuilder,
        render: RenderRequestBuilder,
    ) -> Self {
        Self {
            backend,
            analysis,
            render,
        }
    }

    pub fn from_config(backend: Arc<dyn GenerativeBackend>, config: &Config) -> Self {
        Self::new(
            backend,
            AnalysisRequestBuilder::new(&config.gemini_analysis_model, config.gemini_temperature),
            RenderRequestBuilder::new(&config.gemini_image_model),
        )
    }

    pub fn aspect_ratio_for(image: &ImageInput) -> Result<AspectRatio, PipelineError> {
        let (width, height) = image.dimensions()?;
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidImage(format!(
                "image has no area ({width}x{height})"
            )));
        }
        Ok(AspectRatio::classify(width, height))
    }

    pub async fn analyze(
        &self,
        image: &ImageInput,
        instructions: &str,
    ) -> Result<BilingualAnalysis, PipelineError> {
        self.analysis
            .analyze(self.backend.as_ref(), image, instructions)
            .await
    }

    pub async fn render(&self, request: RenderRequest<'_>) -> Result<RenderedImage, PipelineError> {
        self.render.render(self.backend.as_ref(), request).await
    }

    /// Both variants run concurrently and are joined all-or-nothing: one failed
    /// variant fails the pair even when its sibling produced an image.
    pub async fn render_pair(
        &self,
        pose_image: &ImageInput,
        face_image: Option<&ImageInput>,
        aspect_ratio: AspectRatio,
        instructions: &str,
    ) -> Result<RenderResult, PipelineError> {
        let request = |variant| RenderRequest {
            pose_image,
            face_image,
            aspect_ratio,
            variant,
            instructions,
        };

        let (detailed, abstract_pose) = tokio::join!(
            self.render(request(RenderVariant::Detailed)),
            self.render(request(RenderVariant::Abstract))
        );

        match (detailed, abstract_pose) {
            (Ok(detailed), Ok(abstract_pose)) => Ok(RenderResult {
                detailed,
                r#abstract: abstract_pose,
            }),
            (detailed, abstract_pose) => {
                let mut first_error = None;
                for (variant, result) in [
                    (RenderVariant::Detailed, detailed),
                    (RenderVariant::Abstract, abstract_pose),
                ] {
                    match result {
                        Ok(image) => warn!(
                            "Discarding {} render ({} bytes) because its sibling failed",
                            variant,
                            image.bytes.len()
                        ),
                        Err(err) => {
                            warn!("Render {} failed: {}", variant, err);
                            first_error.get_or_insert(err);
                        }
                    }
                }
                Err(first_error.unwrap_or_else(|| {
                    PipelineError::NoImageProduced("render pair failed".to_string())
                }))
            }
        }
    }

    /// Starts a new generation in `session`, runs everything concurrently and
    /// records each pipeline's outcome as it finishes.
    pub async fn run(
        &self,
        session: &Session,
        source: &ImageInput,
        face: Option<&ImageInput>,
        instructions: &str,
    ) -> Result<RunReport, PipelineError> {
        let generation = session.begin();

        let aspect_ratio = match Self::aspect_ratio_for(source) {
            Ok(aspect_ratio) => aspect_ratio,
            Err(err) => {
                session.finish_analysis(generation, &Err(err.clone()));
                session.finish_renders(generation, &Err(err.clone()));
                return Err(err);
            }
        };
        info!(
            "Run {} started: analysis_model={} image_model={} aspect_ratio={} face_reference={} instructions={:?}",
            generation,
            self.analysis.model(),
            self.render.model(),
            aspect_ratio,
            face.is_some(),
            instructions
        );

        let analysis_task = async {
            let result = self.analyze(source, instructions).await;
            if !session.finish_analysis(generation, &result) {
                info!("Run {} analysis finished after being superseded", generation);
            }
            result
        };
        let render_task = async {
            let result = self
                .render_pair(source, face, aspect_ratio, instructions)
                .await;
            if !session.finish_renders(generation, &result) {
                info!("Run {} renders finished after being superseded", generation);
            }
            result
        };

        let (analysis, renders) = tokio::join!(analysis_task, render_task);
        Ok(RunReport {
            generation,
            aspect_ratio,
            analysis,
            renders,
        })
    }
}
