//! Candidate pair input.
//!
//! The input is a CSV with a header row containing at least `Ref_Candidate`,
//! `Dummy_Candidate`, and `State_Name`. Other columns are ignored.

use std::path::{Path, PathBuf};

use lookalike_types::CandidatePair;
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

pub const REFERENCE_COLUMN: &str = "Ref_Candidate";
pub const DUMMY_COLUMN: &str = "Dummy_Candidate";
pub const STATE_COLUMN: &str = "State_Name";

/// Seed used for reproducible sampling unless configured otherwise.
pub const DEFAULT_SAMPLE_SEED: u64 = 42;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read input {}: {source}", path.display())]
    Read { path: PathBuf, source: csv::Error },
    #[error("input {} has no `{column}` column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// Load every pair from `path`, in file order.
pub fn load_pairs(path: &Path) -> Result<Vec<CandidatePair>, InputError> {
    let read_error = |source| InputError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;

    let headers = reader.headers().map_err(read_error)?.clone();
    let position = |column: &'static str| {
        headers
            .iter()
            .position(|header| header.trim() == column)
            .ok_or_else(|| InputError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
    };
    let reference_idx = position(REFERENCE_COLUMN)?;
    let dummy_idx = position(DUMMY_COLUMN)?;
    let state_idx = position(STATE_COLUMN)?;

    let mut pairs = Vec::new();
    for result in reader.records() {
        let record = result.map_err(read_error)?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        pairs.push(CandidatePair::from_raw_state(
            field(reference_idx),
            field(dummy_idx),
            field(state_idx),
        ));
    }

    tracing::debug!(path = %path.display(), pairs = pairs.len(), "loaded input");
    Ok(pairs)
}

/// Draw `count` pairs without replacement using a seeded generator.
///
/// The same seed and input always yield the same sample, in the same order.
/// A count larger than the input returns every pair.
#[must_use]
pub fn sample_pairs(pairs: Vec<CandidatePair>, count: usize, seed: u64) -> Vec<CandidatePair> {
    if count >= pairs.len() {
        if count > pairs.len() {
            tracing::info!(
                requested = count,
                available = pairs.len(),
                "sample size exceeds input, using every pair"
            );
        }
        return pairs;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let picked = rand::seq::index::sample(&mut rng, pairs.len(), count).into_vec();

    let mut slots: Vec<Option<CandidatePair>> = pairs.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|idx| slots.get_mut(idx).and_then(Option::take))
        .collect()
}
