use std::fmt;

/// Identity of a candidate pair: `(reference, dummy, jurisdiction)`.
///
/// Two pairs with the same key are the same unit of work, regardless of
/// which run produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub reference_name: String,
    pub dummy_name: String,
    pub jurisdiction: String,
}

impl PairKey {
    pub fn new(
        reference_name: impl Into<String>,
        dummy_name: impl Into<String>,
        jurisdiction: impl Into<String>,
    ) -> Self {
        Self {
            reference_name: reference_name.into(),
            dummy_name: dummy_name.into(),
            jurisdiction: jurisdiction.into(),
        }
    }
}

/// Replace underscores in a raw state label with spaces.
///
/// Input datasets use `Tamil_Nadu`; prompts and the checkpoint use `Tamil Nadu`.
#[must_use]
pub fn normalize_jurisdiction(raw: &str) -> String {
    raw.replace('_', " ")
}

/// A reference name and a dummy (copycat) name contesting in the same jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidatePair {
    reference_name: String,
    dummy_name: String,
    jurisdiction: String,
}

impl CandidatePair {
    /// Build a pair from an already-normalized jurisdiction.
    pub fn new(
        reference_name: impl Into<String>,
        dummy_name: impl Into<String>,
        jurisdiction: impl Into<String>,
    ) -> Self {
        Self {
            reference_name: reference_name.into(),
            dummy_name: dummy_name.into(),
            jurisdiction: jurisdiction.into(),
        }
    }

    /// Build a pair from an input row whose state still uses underscores.
    pub fn from_raw_state(
        reference_name: impl Into<String>,
        dummy_name: impl Into<String>,
        raw_state: &str,
    ) -> Self {
        Self::new(reference_name, dummy_name, normalize_jurisdiction(raw_state))
    }

    #[must_use]
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    #[must_use]
    pub fn dummy_name(&self) -> &str {
        &self.dummy_name
    }

    #[must_use]
    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    /// Byte-for-byte equal names. No case folding or trimming.
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.reference_name == self.dummy_name
    }

    #[must_use]
    pub fn key(&self) -> PairKey {
        PairKey::new(
            self.reference_name.clone(),
            self.dummy_name.clone(),
            self.jurisdiction.clone(),
        )
    }
}

impl fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} ({})",
            self.reference_name, self.dummy_name, self.jurisdiction
        )
    }
}
