use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Minimum score at which a pair may be flagged as confusable.
pub const CONFUSABLE_THRESHOLD: f64 = 0.7;

// ============================================================================
// Confusion Category
// ============================================================================

/// Dimension along which two names were judged similar.
///
/// Declaration order is the canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfusionCategory {
    Visual,
    Sound,
    Perception,
    NotConfusing,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown confusion category '{0}'; expected one of VISUAL, SOUND, PERCEPTION, NOT_CONFUSING")]
pub struct UnknownCategoryError(pub String);

impl ConfusionCategory {
    pub const ALL: [ConfusionCategory; 4] = [
        ConfusionCategory::Visual,
        ConfusionCategory::Sound,
        ConfusionCategory::Perception,
        ConfusionCategory::NotConfusing,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visual => "VISUAL",
            Self::Sound => "SOUND",
            Self::Perception => "PERCEPTION",
            Self::NotConfusing => "NOT_CONFUSING",
        }
    }
}

impl FromStr for ConfusionCategory {
    type Err = UnknownCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s.trim())
            .ok_or_else(|| UnknownCategoryError(s.to_string()))
    }
}

impl fmt::Display for ConfusionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Confusion Score
// ============================================================================

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum ScoreError {
    #[error("confusion score must be a number, got NaN")]
    NotANumber,
    #[error("confusion score {0} is outside [0.0, 1.0]")]
    OutOfRange(f64),
}

/// A confusability score in `[0.0, 1.0]`.
///
/// Bands: below 0.3 not confusing, 0.4-0.6 somewhat, 0.7-0.9 very, 1.0 identical.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ConfusionScore(f64);

impl ConfusionScore {
    pub const IDENTICAL: ConfusionScore = ConfusionScore(1.0);

    pub fn new(value: f64) -> Result<Self, ScoreError> {
        if value.is_nan() {
            return Err(ScoreError::NotANumber);
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ScoreError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whether this score is high enough to allow a confusable flag.
    #[must_use]
    pub fn meets_threshold(self) -> bool {
        self.0 >= CONFUSABLE_THRESHOLD
    }
}

impl fmt::Display for ConfusionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Judgment
// ============================================================================

/// One name rendered in the national reference script and the regional script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transliteration {
    /// Devanagari (Hindi) rendering.
    pub primary_script_form: Option<String>,
    /// Rendering in the jurisdiction's dominant script.
    pub regional_script_form: Option<String>,
}

impl Transliteration {
    pub fn new(primary: impl Into<String>, regional: impl Into<String>) -> Self {
        Self {
            primary_script_form: Some(primary.into()),
            regional_script_form: Some(regional.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum JudgmentError {
    #[error("pair flagged confusable with score {0}, below the 0.7 threshold")]
    FlagBelowThreshold(f64),
}

/// Structured confusability verdict for a candidate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    reference_transliteration: Transliteration,
    dummy_transliteration: Transliteration,
    is_confusable: bool,
    confusion_categories: BTreeSet<ConfusionCategory>,
    confusion_score: ConfusionScore,
}

impl Judgment {
    /// Build a judgment, rejecting a confusable flag below [`CONFUSABLE_THRESHOLD`].
    pub fn new(
        reference_transliteration: Transliteration,
        dummy_transliteration: Transliteration,
        is_confusable: bool,
        confusion_categories: BTreeSet<ConfusionCategory>,
        confusion_score: ConfusionScore,
    ) -> Result<Self, JudgmentError> {
        if is_confusable && !confusion_score.meets_threshold() {
            return Err(JudgmentError::FlagBelowThreshold(confusion_score.value()));
        }
        Ok(Self {
            reference_transliteration,
            dummy_transliteration,
            is_confusable,
            confusion_categories,
            confusion_score,
        })
    }

    /// Verdict for byte-identical names. Needs no external judgment.
    #[must_use]
    pub fn identical() -> Self {
        Self {
            reference_transliteration: Transliteration::default(),
            dummy_transliteration: Transliteration::default(),
            is_confusable: true,
            confusion_categories: BTreeSet::from([
                ConfusionCategory::Visual,
                ConfusionCategory::Sound,
                ConfusionCategory::Perception,
            ]),
            confusion_score: ConfusionScore::IDENTICAL,
        }
    }

    #[must_use]
    pub fn reference_transliteration(&self) -> &Transliteration {
        &self.reference_transliteration
    }

    #[must_use]
    pub fn dummy_transliteration(&self) -> &Transliteration {
        &self.dummy_transliteration
    }

    #[must_use]
    pub fn is_confusable(&self) -> bool {
        self.is_confusable
    }

    #[must_use]
    pub fn confusion_categories(&self) -> &BTreeSet<ConfusionCategory> {
        &self.confusion_categories
    }

    #[must_use]
    pub fn confusion_score(&self) -> ConfusionScore {
        self.confusion_score
    }
}
