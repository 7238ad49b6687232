//! Batched, resumable control loop.
//!
//! ```text
//! Init -> Filter -> BatchProcessing* -> Done
//!                        |
//!                        +-- cancel --> FlushAndStop
//! ```
//!
//! Progress is durable at batch granularity: each batch's successes are
//! appended to the checkpoint before the next batch starts, and an interrupted
//! batch is flushed before the run returns. Pairs that exhaust their retries
//! are not recorded and will be attempted again by the next run.

use std::path::Path;
use std::time::Duration;

use lookalike_providers::TextGenerator;
use lookalike_types::{CandidatePair, ResultRecord};
use thiserror::Error;

use crate::cancel::CancelFlag;
use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::input::{DEFAULT_SAMPLE_SEED, InputError, load_pairs, sample_pairs};
use crate::retrying::{JudgeOutcome, RetryingJudge};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Pairs per checkpoint flush. Must be at least 1.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_delay: Duration,
    /// Judge only a seeded random subset of this size.
    pub sample: Option<usize>,
    pub seed: u64,
    /// Load and filter, then report the plan without judging anything.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            sample: None,
            seed: DEFAULT_SAMPLE_SEED,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pairs selected for this run, after sampling.
    pub input_total: usize,
    /// Selected pairs already present in the checkpoint.
    pub already_processed: usize,
    /// Pairs handed to the judge this run.
    pub attempted: usize,
    pub judged: usize,
    pub unresolved: usize,
    /// Rows in the checkpoint when the run ended.
    pub persisted_total: usize,
    pub interrupted: bool,
}

impl RunSummary {
    /// Selected pairs still missing from the checkpoint.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input_total.saturating_sub(self.already_processed + self.judged)
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

pub struct BatchRunner<G> {
    judge: RetryingJudge<G>,
    store: CheckpointStore,
    options: RunOptions,
    cancel: CancelFlag,
}

impl<G: TextGenerator> BatchRunner<G> {
    pub fn new(
        judge: RetryingJudge<G>,
        store: CheckpointStore,
        options: RunOptions,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            judge,
            store,
            options,
            cancel,
        }
    }

    #[must_use]
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Load pairs from an input CSV and process them.
    pub async fn run(&self, input: &Path) -> Result<RunSummary, RunError> {
        let pairs = load_pairs(input)?;
        tracing::info!(path = %input.display(), pairs = pairs.len(), "Loaded input");
        self.run_pairs(pairs).await
    }

    pub async fn run_pairs(&self, pairs: Vec<CandidatePair>) -> Result<RunSummary, RunError> {
        let batch_size = self.options.batch_size;
        if batch_size == 0 {
            return Err(RunError::InvalidBatchSize);
        }

        // Init
        let pairs = match self.options.sample {
            Some(count) => sample_pairs(pairs, count, self.options.seed),
            None => pairs,
        };
        let mut summary = RunSummary {
            input_total: pairs.len(),
            ..RunSummary::default()
        };

        // Filter
        let processed = self.store.load_processed_keys()?;
        let remaining: Vec<CandidatePair> = pairs
            .into_iter()
            .filter(|pair| !processed.contains(&pair.key()))
            .collect();
        summary.already_processed = summary.input_total - remaining.len();

        if summary.already_processed > 0 {
            tracing::info!(
                already_processed = summary.already_processed,
                "Resuming processing with {} remaining entries...",
                remaining.len()
            );
        } else {
            tracing::info!("Processing {} entries...", remaining.len());
        }

        let batch_count = remaining.len().div_ceil(batch_size);
        if self.options.dry_run {
            tracing::info!(
                remaining = remaining.len(),
                batches = batch_count,
                batch_size,
                "Dry run, no pairs will be judged"
            );
            summary.persisted_total = self.store.row_count()?;
            return Ok(summary);
        }

        // BatchProcessing
        let total = remaining.len();
        let mut accumulator: Vec<ResultRecord> = Vec::with_capacity(batch_size);
        summary.persisted_total = self.store.row_count()?;

        for (batch_index, batch) in remaining.chunks(batch_size).enumerate() {
            tracing::debug!(batch = batch_index + 1, batches = batch_count, "starting batch");

            for pair in batch {
                if self.cancel.is_cancelled() {
                    summary.interrupted = true;
                    break;
                }

                summary.attempted += 1;
                tracing::info!(
                    progress = %format!("{}/{total}", summary.attempted),
                    "Processing {pair}"
                );

                match self.judge.judge_with_retry(pair).await {
                    JudgeOutcome::Judged(judgment) => {
                        summary.judged += 1;
                        accumulator.push(ResultRecord::new(pair.clone(), judgment));
                    }
                    JudgeOutcome::Unresolved { attempts, .. } => {
                        summary.unresolved += 1;
                        tracing::debug!(attempts, "{pair} left for the next run");
                    }
                    JudgeOutcome::Cancelled => {
                        summary.interrupted = true;
                        break;
                    }
                }
            }

            // FlushAndStop shares the flush with the normal batch end.
            if let Some(persisted) = self.flush(&mut accumulator)? {
                summary.persisted_total = persisted;
                tracing::info!(
                    batch = batch_index + 1,
                    batches = batch_count,
                    persisted,
                    "Batch saved"
                );
            }

            if summary.interrupted {
                break;
            }
            let more_batches = batch_index + 1 < batch_count;
            if more_batches && !self.cancel.sleep(self.options.batch_delay).await {
                summary.interrupted = true;
                break;
            }
        }

        // Done
        if summary.interrupted {
            tracing::warn!(
                persisted = summary.persisted_total,
                "Interrupted. Progress saved. You can resume later"
            );
        }
        tracing::info!(
            input_total = summary.input_total,
            already_processed = summary.already_processed,
            attempted = summary.attempted,
            judged = summary.judged,
            unresolved = summary.unresolved,
            persisted_total = summary.persisted_total,
            interrupted = summary.interrupted,
            "Run finished"
        );
        Ok(summary)
    }

    /// Append and clear the accumulator. `None` when there was nothing to write.
    fn flush(&self, accumulator: &mut Vec<ResultRecord>) -> Result<Option<usize>, RunError> {
        if accumulator.is_empty() {
            return Ok(None);
        }
        match self.store.append(accumulator) {
            Ok(persisted) => {
                accumulator.clear();
                Ok(Some(persisted))
            }
            Err(err) => {
                tracing::error!(
                    lost = accumulator.len(),
                    path = %self.store.path().display(),
                    "Failed to save batch results: {err}"
                );
                Err(err.into())
            }
        }
    }
}
