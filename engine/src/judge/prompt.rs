//! Instruction text for the pair comparison.
//!
//! The JSON shape requested here is the shape `parse` expects; change both together.

use lookalike_types::CandidatePair;

/// Script every name is transliterated into regardless of jurisdiction.
pub const NATIONAL_SCRIPT: &str = "Hindi (Devanagari)";

pub(crate) fn build_prompt(pair: &CandidatePair) -> String {
    let state = pair.jurisdiction();
    let reference = pair.reference_name();
    let dummy = pair.dummy_name();

    format!(
        r#"Task: Compare these two Indian names from {state} state:
1. Reference name: "{reference}"
2. Dummy name: "{dummy}"

Provide:
1. Transliterations for both names in:
   - {NATIONAL_SCRIPT}
   - The primary regional language script of {state}
2. Analyze if these specific names could be confused with each other if they are on the same ballot.

Consider these specific aspects:
- Visual similarity in writing (both scripts)
- Sound/pronunciation similarity
- Overall perception by voters

Rules for determining confusion:
- Names must share significant parts (not just common prefixes like 'VIJAY' or 'RAM')
- Consider voter confusion in a ballot context
- Single-word vs multi-word name differences are significant
- Different middle names or initials make names distinct
- Common surname matches alone are not enough (e.g., 'SINGH', 'KUMAR')

Rules for output:
- Return ONLY a JSON object with exactly this format, no other text:
{{
    "reference": {{"hindi": "hindi_trans", "regional": "regional_trans"}},
    "dummy": {{"hindi": "hindi_trans", "regional": "regional_trans"}},
    "potentially_confusing": true_or_false,
    "confusion_type": ["VISUAL", "SOUND", "PERCEPTION", "NOT_CONFUSING"],
    "confusion_score": 0.0 to 1.0
}}
- If the state's primary language uses Devanagari script, return the same as hindi for regional
- For confusion_type: include only if similarity exists in that category
- For confusion_score:
  * 0.0-0.3: Not confusing
  * 0.4-0.6: Somewhat confusing
  * 0.7-0.9: Very confusing
  * 1.0: Identical
- Set potentially_confusing to true ONLY if confusion_score >= 0.7
"#
    )
}
