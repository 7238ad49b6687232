//! Core engine for lookalike - judging, retry, checkpointing, and the batch loop.
//!
//! This crate contains the pipeline without any terminal or process concerns.
//! The binary wires a [`TextGenerator`] into a [`BatchRunner`] and handles
//! signals; everything else lives here.

mod cancel;
mod checkpoint;
mod input;
mod judge;
mod retrying;
mod runner;

#[cfg(test)]
mod testing;

// Re-export from crates for public API
pub use lookalike_providers::{self, GeminiClient, GenerationError, TextGenerator};
pub use lookalike_types::{CandidatePair, Judgment, PairKey, ResultRecord};

pub use cancel::CancelFlag;
pub use checkpoint::{CheckpointError, CheckpointStore, OUTPUT_COLUMNS};
pub use input::{
    DEFAULT_SAMPLE_SEED, DUMMY_COLUMN, InputError, REFERENCE_COLUMN, STATE_COLUMN, load_pairs,
    sample_pairs,
};
pub use judge::{DEFAULT_TEMPERATURE, FailureReason, JudgeFailure, NATIONAL_SCRIPT, PairJudge};
pub use retrying::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF, JudgeOutcome, RetryPolicy, RetryingJudge,
};
pub use runner::{
    BatchRunner, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, RunError, RunOptions, RunSummary,
};

// Config types - passed in from caller
mod config;
pub use config::{
    API_KEY_ENV, CONFIG_PATH_ENV, ConfigError, DEFAULT_INPUT_FILE, GoogleConfig, LookalikeConfig,
    RunConfig, config_path, expand_env_vars,
};
