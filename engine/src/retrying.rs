//! Bounded retry around [`PairJudge`].
//!
//! The attempt loop is an explicit state machine:
//!
//! ```text
//! Attempting{n} --ok--------------------------> Judged
//! Attempting{n} --fail, n < max--> Waiting{n} --> Attempting{n+1}
//! Attempting{n} --fail, n == max--------------> Unresolved
//! Attempting{n} --cancel----------------------> Cancelled
//! Waiting{n}    --cancel----------------------> Cancelled
//! ```
//!
//! A cancel drops the in-flight call; that pair is judged again on the next run.

use std::time::Duration;

use lookalike_providers::TextGenerator;
use lookalike_types::{CandidatePair, Judgment};

use crate::cancel::CancelFlag;
use crate::judge::{JudgeFailure, PairJudge};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt: the fixed backoff, stretched to honor a server hint.
    #[must_use]
    pub fn delay_for(&self, failure: &JudgeFailure) -> Duration {
        failure
            .reason
            .retry_after()
            .map_or(self.backoff, |hint| hint.max(self.backoff))
    }
}

/// Terminal result for one pair.
#[derive(Debug)]
pub enum JudgeOutcome {
    Judged(Judgment),
    /// Every attempt failed. The pair is left for a later run.
    Unresolved {
        attempts: u32,
        last_failure: JudgeFailure,
    },
    /// Cancellation arrived while waiting between attempts.
    Cancelled,
}

enum RetryState {
    Attempting { attempt: u32 },
    Waiting { attempt: u32, delay: Duration },
    Done(JudgeOutcome),
}

pub struct RetryingJudge<G> {
    judge: PairJudge<G>,
    policy: RetryPolicy,
    cancel: CancelFlag,
}

impl<G: TextGenerator> RetryingJudge<G> {
    pub fn new(judge: PairJudge<G>, policy: RetryPolicy, cancel: CancelFlag) -> Self {
        Self {
            judge,
            policy,
            cancel,
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// One judge call, abandoned if cancellation arrives first.
    async fn attempt(&self, pair: &CandidatePair) -> Option<Result<Judgment, JudgeFailure>> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            result = self.judge.judge(pair) => Some(result),
        }
    }

    pub async fn judge_with_retry(&self, pair: &CandidatePair) -> JudgeOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = RetryState::Attempting { attempt: 1 };

        loop {
            state = match state {
                RetryState::Attempting { attempt } => match self.attempt(pair).await {
                    None => RetryState::Done(JudgeOutcome::Cancelled),
                    Some(Ok(judgment)) => RetryState::Done(JudgeOutcome::Judged(judgment)),
                    Some(Err(failure)) => {
                        tracing::debug!(
                            pair = %pair,
                            attempt,
                            max_attempts,
                            raw_response = failure.raw_response.as_deref().unwrap_or(""),
                            "judgment attempt failed: {}",
                            failure.reason
                        );
                        if attempt >= max_attempts {
                            tracing::warn!(
                                reference = pair.reference_name(),
                                dummy = pair.dummy_name(),
                                state = pair.jurisdiction(),
                                attempts = attempt,
                                "Skipping pair after all retries: {}",
                                failure.reason
                            );
                            RetryState::Done(JudgeOutcome::Unresolved {
                                attempts: attempt,
                                last_failure: failure,
                            })
                        } else {
                            RetryState::Waiting {
                                attempt,
                                delay: self.policy.delay_for(&failure),
                            }
                        }
                    }
                },
                RetryState::Waiting { attempt, delay } => {
                    if self.cancel.sleep(delay).await {
                        RetryState::Attempting {
                            attempt: attempt + 1,
                        }
                    } else {
                        RetryState::Done(JudgeOutcome::Cancelled)
                    }
                }
                RetryState::Done(outcome) => return outcome,
            };
        }
    }
}
