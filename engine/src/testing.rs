//! Stub generation services for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use lookalike_providers::{GenerationError, GenerationRequest, TextGenerator};

/// Replays a fixed queue of responses, then fails with `EmptyResponse`.
#[derive(Debug, Default)]
pub(crate) struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub(crate) fn new(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().expect("requests lock").last().cloned()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

/// Answers every request with the result of a closure over the prompt.
pub(crate) struct FnGenerator<F> {
    respond: F,
    calls: AtomicUsize,
}

impl<F> FnGenerator<F>
where
    F: Fn(&str) -> Result<String, GenerationError> + Sync,
{
    pub(crate) fn new(respond: F) -> Self {
        Self {
            respond,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> TextGenerator for FnGenerator<F>
where
    F: Fn(&str) -> Result<String, GenerationError> + Sync,
{
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(&request.prompt)
    }
}

/// Never answers prompts containing `marker`; answers everything else with a low score.
pub(crate) struct HangingGenerator {
    marker: &'static str,
    calls: AtomicUsize,
}

impl HangingGenerator {
    pub(crate) fn new(marker: &'static str) -> Self {
        Self {
            marker,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for HangingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt.contains(self.marker) {
            std::future::pending::<()>().await;
        }
        Ok(judgment_json(0.1))
    }
}

/// A well-formed judgment payload with the given score.
pub(crate) fn judgment_json(score: f64) -> String {
    let confusable = score >= lookalike_types::CONFUSABLE_THRESHOLD;
    let category = if confusable { "SOUND" } else { "NOT_CONFUSING" };
    format!(
        r#"{{
            "reference": {{"hindi": "राम", "regional": "राम"}},
            "dummy": {{"hindi": "श्याम", "regional": "श्याम"}},
            "potentially_confusing": {confusable},
            "confusion_type": ["{category}"],
            "confusion_score": {score}
        }}"#
    )
}
