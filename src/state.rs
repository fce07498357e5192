use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::PipelineError;
use crate::pipeline::models::BilingualAnalysis;
use crate::pipeline::render::RenderResult;

/// Lifecycle of one pipeline's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Idle,
    InFlight,
    Succeeded(T),
    Failed(String),
}

impl<T> Slot<T> {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Slot::InFlight)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Slot::Succeeded(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Slot::Idle => "idle",
            Slot::InFlight => "in_flight",
            Slot::Succeeded(_) => "succeeded",
            Slot::Failed(_) => "failed",
        }
    }
}

impl<T: Clone> Slot<T> {
    fn from_result(result: &Result<T, PipelineError>) -> Self {
        match result {
            Ok(value) => Slot::Succeeded(value.clone()),
            Err(err) => Slot::Failed(err.to_string()),
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    generation: u64,
    analysis: Slot<BilingualAnalysis>,
    renders: Slot<RenderResult>,
    save: Slot<()>,
}

/// Shared handle over the per-run result slots.
///
/// Every run takes a generation number from [`Session::begin`]; writes carrying
/// an older generation are dropped, so a superseded run can never overwrite the
/// results of the one that replaced it.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            inner: Arc::new(Mutex::new(SessionInner {
                generation: 0,
                analysis: Slot::Idle,
                renders: Slot::Idle,
                save: Slot::Idle,
            })),
        }
    }

    pub fn begin(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.analysis = Slot::InFlight;
        inner.renders = Slot::InFlight;
        inner.save = Slot::Idle;
        inner.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().generation == generation
    }

    pub fn finish_analysis(
        &self,
        generation: u64,
        result: &Result<BilingualAnalysis, PipelineError>,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.analysis = Slot::from_result(result);
        true
    }

    pub fn finish_renders(
        &self,
        generation: u64,
        result: &Result<RenderResult, PipelineError>,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.renders = Slot::from_result(result);
        true
    }

    /// Refuses while a save is already running or nothing has been analyzed.
    pub fn begin_save(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation
            || inner.save.is_in_flight()
            || !matches!(inner.analysis, Slot::Succeeded(_))
        {
            return false;
        }
        inner.save = Slot::InFlight;
        true
    }

    pub fn finish_save(&self, generation: u64, outcome: Result<(), String>) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        inner.save = match outcome {
            Ok(()) => Slot::Succeeded(()),
            Err(message) => Slot::Failed(message),
        };
        true
    }

    pub fn analysis(&self) -> Slot<BilingualAnalysis> {
        self.inner.lock().analysis.clone()
    }

    pub fn renders(&self) -> Slot<RenderResult> {
        self.inner.lock().renders.clone()
    }

    pub fn save(&self) -> Slot<()> {
        self.inner.lock().save.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::models::tests::sample_bilingual_json;

    fn sample_analysis() -> BilingualAnalysis {
        serde_json::from_value(sample_bilingual_json()).unwrap()
    }

    #[test]
    fn begin_marks_both_pipelines_in_flight() {
        let session = Session::new();
        assert_eq!(session.analysis(), Slot::Idle);
        let generation = session.begin();
        assert_eq!(generation, 1);
        assert!(session.analysis().is_in_flight());
        assert!(session.renders().is_in_flight());
    }

    #[test]
    fn pipelines_fail_independently() {
        let session = Session::new();
        let generation = session.begin();
        assert!(session.finish_renders(
            generation,
            &Err(PipelineError::NoImageProduced("text only".into()))
        ));
        assert!(session.analysis().is_in_flight());
        assert_eq!(session.renders().label(), "failed");

        assert!(session.finish_analysis(generation, &Ok(sample_analysis())));
        assert!(matches!(session.analysis(), Slot::Succeeded(_)));
    }

    #[test]
    fn stale_generation_never_overwrites_newer_run() {
        let session = Session::new();
        let first = session.begin();
        let second = session.begin();

        assert!(!session.finish_analysis(first, &Ok(sample_analysis())));
        assert!(session.analysis().is_in_flight());

        assert!(session.finish_analysis(
            second,
            &Err(PipelineError::ModelCall("timeout".into()))
        ));
        assert!(!session.finish_analysis(first, &Ok(sample_analysis())));
        assert_eq!(
            session.analysis(),
            Slot::Failed("Model call failed: timeout".to_string())
        );
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
    }

    #[test]
    fn save_requires_analysis_and_is_not_reentrant() {
        let session = Session::new();
        let generation = session.begin();
        assert!(!session.begin_save(generation));

        session.finish_analysis(generation, &Ok(sample_analysis()));
        assert!(session.begin_save(generation));
        assert!(!session.begin_save(generation));
        assert!(session.finish_save(generation, Err("quota exceeded".into())));
        assert_eq!(session.save(), Slot::Failed("quota exceeded".into()));
    }
}
