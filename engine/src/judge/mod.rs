//! Single-shot judgment of one candidate pair.
//!
//! [`PairJudge`] owns the instruction text ([`prompt`]) and the output
//! validation ([`parse`]). It calls the generation service at most once per
//! [`PairJudge::judge`] and never retries; that is [`crate::RetryingJudge`]'s job.

mod parse;
mod prompt;

use std::time::Duration;

use lookalike_providers::{GenerationError, GenerationRequest, TextGenerator};
use lookalike_types::{CandidatePair, Judgment, JudgmentError, ScoreError, UnknownCategoryError};
use thiserror::Error;

pub use prompt::NATIONAL_SCRIPT;

/// Sampling temperature used unless configured otherwise.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Why a single judgment attempt produced no usable verdict.
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response is missing field `{0}`")]
    MissingField(&'static str),
    #[error("response has {0}")]
    InvalidCategory(#[from] UnknownCategoryError),
    #[error("response has invalid score: {0}")]
    InvalidScore(#[from] ScoreError),
    #[error("response is inconsistent: {0}")]
    Inconsistent(#[from] JudgmentError),
}

impl FailureReason {
    /// Server-requested wait, when the service rate-limited the attempt.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Generation(err) => err.retry_after(),
            _ => None,
        }
    }
}

/// A failed attempt, with the raw response text when one was received.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct JudgeFailure {
    pub reason: FailureReason,
    pub raw_response: Option<String>,
}

impl From<GenerationError> for JudgeFailure {
    fn from(err: GenerationError) -> Self {
        Self {
            reason: FailureReason::Generation(err),
            raw_response: None,
        }
    }
}

/// Builds the instruction, calls the service once, and validates the answer.
#[derive(Debug, Clone)]
pub struct PairJudge<G> {
    generator: G,
    temperature: f32,
}

impl<G: TextGenerator> PairJudge<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Judge one pair. Identical names are answered locally.
    pub async fn judge(&self, pair: &CandidatePair) -> Result<Judgment, JudgeFailure> {
        if pair.is_identical() {
            tracing::debug!(pair = %pair, "identical names, skipping service call");
            return Ok(Judgment::identical());
        }

        let request = GenerationRequest::json(prompt::build_prompt(pair), self.temperature);
        let text = self.generator.generate(&request).await?;

        parse::parse_judgment(&text).map_err(|reason| JudgeFailure {
            reason,
            raw_response: Some(text),
        })
    }
}
