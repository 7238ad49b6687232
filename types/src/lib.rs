//! Core domain types for lookalike.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod judgment;
mod pair;

pub use judgment::{
    CONFUSABLE_THRESHOLD, ConfusionCategory, ConfusionScore, Judgment, JudgmentError, ScoreError,
    Transliteration, UnknownCategoryError,
};
pub use pair::{CandidatePair, PairKey, normalize_jurisdiction};

// ============================================================================
// Result Record
// ============================================================================

/// A candidate pair merged with its judgment; the unit of persistence.
///
/// Records are created once a judgment succeeds and are only ever appended to
/// the checkpoint, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pair: CandidatePair,
    judgment: Judgment,
}

impl ResultRecord {
    #[must_use]
    pub fn new(pair: CandidatePair, judgment: Judgment) -> Self {
        Self { pair, judgment }
    }

    #[must_use]
    pub fn pair(&self) -> &CandidatePair {
        &self.pair
    }

    #[must_use]
    pub fn judgment(&self) -> &Judgment {
        &self.judgment
    }

    #[must_use]
    pub fn key(&self) -> PairKey {
        self.pair.key()
    }
}
