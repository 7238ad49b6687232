//! Durable, append-only result set.
//!
//! The checkpoint is a CSV file holding one row per judged pair. It is the only
//! record of progress: a pair whose key appears here is never judged again for
//! the same output target.
//!
//! # Format
//!
//! ```text
//! ref_name,dummy_name,state,ref_hindi,ref_regional,dummy_hindi,dummy_regional,potentially_confusing,confusion_type,confusion_score
//! RAJESH KUMAR,RAJESH KUMAR,Maharashtra,,,,,True,"['VISUAL', 'SOUND', 'PERCEPTION']",1.0
//! ```
//!
//! Absent transliterations are empty cells. Categories are written as a
//! single-quoted list literal; JSON arrays are also accepted on read.
//!
//! Existing files are read by header name, so column order may differ. Columns
//! outside the ten above are ignored on read and dropped by the next
//! [`CheckpointStore::append`], which always writes the canonical layout.
//!
//! # Durability
//!
//! Every [`CheckpointStore::append`] rewrites the whole file through
//! [`lookalike_utils::atomic_write_with`], so a crash mid-write leaves either the
//! old file or the new one, never a torn mix.

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use lookalike_types::{
    CandidatePair, ConfusionCategory, ConfusionScore, Judgment, PairKey, ResultRecord,
    Transliteration,
};
use lookalike_utils::{atomic_write_with, recover_bak_file};
use thiserror::Error;

/// Output columns, in file order.
pub const OUTPUT_COLUMNS: [&str; 10] = [
    "ref_name",
    "dummy_name",
    "state",
    "ref_hindi",
    "ref_regional",
    "dummy_hindi",
    "dummy_regional",
    "potentially_confusing",
    "confusion_type",
    "confusion_score",
];

const KEY_COLUMNS: [&str; 3] = ["ref_name", "dummy_name", "state"];

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint {}: {source}", path.display())]
    Read { path: PathBuf, source: csv::Error },
    #[error("failed to write checkpoint {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("checkpoint {} has no `{column}` column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("checkpoint {} row {row}: {message}", path.display())]
    MalformedRow {
        path: PathBuf,
        row: usize,
        message: String,
    },
}

/// Owner of one output file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys of every persisted record. A missing file is an empty set.
    pub fn load_processed_keys(&self) -> Result<HashSet<PairKey>, CheckpointError> {
        let Some(mut reader) = self.open()? else {
            return Ok(HashSet::new());
        };
        let positions = self.column_positions(&mut reader, &KEY_COLUMNS)?;

        let mut keys = HashSet::new();
        for result in reader.records() {
            let record = result.map_err(|source| self.read_error(source))?;
            let field = |i: usize| record.get(positions[i]).unwrap_or_default();
            keys.insert(PairKey::new(field(0), field(1), field(2)));
        }
        Ok(keys)
    }

    /// Number of persisted rows.
    pub fn row_count(&self) -> Result<usize, CheckpointError> {
        Ok(self.load_rows()?.len())
    }

    /// Every persisted record, strictly validated.
    pub fn load_records(&self) -> Result<Vec<ResultRecord>, CheckpointError> {
        self.load_rows()?
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                parse_record(row).map_err(|message| CheckpointError::MalformedRow {
                    path: self.path.clone(),
                    row: idx + 1,
                    message,
                })
            })
            .collect()
    }

    /// Append `records` after the existing rows and rewrite the file atomically.
    ///
    /// The rewrite uses [`OUTPUT_COLUMNS`]; any other columns in the old file are dropped.
    ///
    /// Returns the total number of persisted rows. An empty slice is a no-op.
    pub fn append(&self, records: &[ResultRecord]) -> Result<usize, CheckpointError> {
        let existing = self.load_rows()?;
        if records.is_empty() {
            return Ok(existing.len());
        }
        let total = existing.len() + records.len();

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| self.write_error(source))?;
        }

        atomic_write_with(&self.path, |out| {
            let mut writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(out);
            writer.write_record(OUTPUT_COLUMNS)?;
            for row in &existing {
                writer.write_record(row)?;
            }
            for record in records {
                writer.write_record(format_record(record))?;
            }
            writer.flush()
        })
        .map_err(|source| self.write_error(source))?;

        tracing::debug!(
            path = %self.path.display(),
            appended = records.len(),
            total,
            "checkpoint written"
        );
        Ok(total)
    }

    fn open(&self) -> Result<Option<csv::Reader<std::fs::File>>, CheckpointError> {
        recover_bak_file(&self.path);
        if !self.path.exists() {
            return Ok(None);
        }
        csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map(Some)
            .map_err(|source| self.read_error(source))
    }

    /// Existing rows, re-ordered into [`OUTPUT_COLUMNS`] order.
    fn load_rows(&self) -> Result<Vec<StringRecord>, CheckpointError> {
        let Some(mut reader) = self.open()? else {
            return Ok(Vec::new());
        };
        let positions = self.column_positions(&mut reader, &OUTPUT_COLUMNS)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|source| self.read_error(source))?;
            rows.push(
                positions
                    .iter()
                    .map(|&pos| record.get(pos).unwrap_or_default())
                    .collect::<StringRecord>(),
            );
        }
        Ok(rows)
    }

    fn column_positions(
        &self,
        reader: &mut csv::Reader<std::fs::File>,
        columns: &[&'static str],
    ) -> Result<Vec<usize>, CheckpointError> {
        let headers = reader
            .headers()
            .map_err(|source| self.read_error(source))?
            .clone();
        columns
            .iter()
            .map(|&column| {
                headers
                    .iter()
                    .position(|header| header.trim() == column)
                    .ok_or_else(|| CheckpointError::MissingColumn {
                        path: self.path.clone(),
                        column,
                    })
            })
            .collect()
    }

    fn read_error(&self, source: csv::Error) -> CheckpointError {
        CheckpointError::Read {
            path: self.path.clone(),
            source,
        }
    }

    fn write_error(&self, source: io::Error) -> CheckpointError {
        CheckpointError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

fn format_record(record: &ResultRecord) -> [String; 10] {
    let pair = record.pair();
    let judgment = record.judgment();
    let cell = |value: &Option<String>| value.clone().unwrap_or_default();
    [
        pair.reference_name().to_string(),
        pair.dummy_name().to_string(),
        pair.jurisdiction().to_string(),
        cell(&judgment.reference_transliteration().primary_script_form),
        cell(&judgment.reference_transliteration().regional_script_form),
        cell(&judgment.dummy_transliteration().primary_script_form),
        cell(&judgment.dummy_transliteration().regional_script_form),
        format_flag(judgment.is_confusable()).to_string(),
        format_categories(judgment.confusion_categories()),
        format_score(judgment.confusion_score()),
    ]
}

fn format_flag(flag: bool) -> &'static str {
    if flag { "True" } else { "False" }
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim() {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        other => Err(format!("invalid potentially_confusing value '{other}'")),
    }
}

/// `['VISUAL', 'SOUND']`
pub(crate) fn format_categories(categories: &BTreeSet<ConfusionCategory>) -> String {
    let items: Vec<String> = categories
        .iter()
        .map(|category| format!("'{category}'"))
        .collect();
    format!("[{}]", items.join(", "))
}

/// Accepts list literals with single or double quotes.
pub(crate) fn parse_categories(raw: &str) -> Result<BTreeSet<ConfusionCategory>, String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| format!("invalid confusion_type list '{trimmed}'"))?;

    inner
        .split(',')
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"'))
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<ConfusionCategory>().map_err(|e| e.to_string()))
        .collect()
}

/// Always carries a decimal point (`1.0`, not `1`).
fn format_score(score: ConfusionScore) -> String {
    let text = score.value().to_string();
    if text.contains('.') {
        text
    } else {
        format!("{text}.0")
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `row` is in [`OUTPUT_COLUMNS`] order.
fn parse_record(row: &StringRecord) -> Result<ResultRecord, String> {
    let field = |i: usize| row.get(i).unwrap_or_default();

    let pair = CandidatePair::new(field(0), field(1), field(2));
    let reference = Transliteration {
        primary_script_form: non_empty(field(3)),
        regional_script_form: non_empty(field(4)),
    };
    let dummy = Transliteration {
        primary_script_form: non_empty(field(5)),
        regional_script_form: non_empty(field(6)),
    };
    let is_confusable = parse_flag(field(7))?;
    let categories = parse_categories(field(8))?;
    let score = field(9)
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid confusion_score '{}': {e}", field(9)))?;
    let score = ConfusionScore::new(score).map_err(|e| e.to_string())?;

    let judgment = Judgment::new(reference, dummy, is_confusable, categories, score)
        .map_err(|e| e.to_string())?;
    Ok(ResultRecord::new(pair, judgment))
}
