//! Strict parsing of the generation service's judgment payload.
//!
//! The service is asked for JSON but is not trusted to deliver it cleanly: it may
//! wrap the object in markdown fences, prefix a `json` tag, or emit raw backslashes
//! next to regional-script text. [`clean_response`] removes that noise; everything
//! after it is strict. Every field must be present, non-null, and well-typed.

use std::collections::BTreeSet;

use lookalike_types::{ConfusionCategory, ConfusionScore, Judgment, Transliteration};
use serde::Deserialize;

use super::FailureReason;

#[derive(Debug, Deserialize)]
struct RawTransliteration {
    hindi: Option<String>,
    regional: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    reference: Option<RawTransliteration>,
    dummy: Option<RawTransliteration>,
    potentially_confusing: Option<bool>,
    confusion_type: Option<Vec<String>>,
    confusion_score: Option<f64>,
}

/// Strip fences, a leading format tag, and repair stray backslashes.
pub(crate) fn clean_response(text: &str) -> String {
    let mut cleaned = text.trim().trim_matches('`').trim();
    if let Some(rest) = strip_prefix_ignore_ascii_case(cleaned, "json") {
        cleaned = rest.trim_start();
    }
    escape_stray_backslashes(cleaned)
}

fn strip_prefix_ignore_ascii_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

/// Double every backslash that does not begin a valid JSON escape.
///
/// Valid escapes (`\"`, `\\`, `\/`, `\b`, `\f`, `\n`, `\r`, `\t`, `\uXXXX`) pass
/// through unchanged, so well-formed output is never altered.
pub(crate) fn escape_stray_backslashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        match chars.peek().map(|&(_, next)| next) {
            Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => {
                out.push('\\');
                if let Some((_, next)) = chars.next() {
                    out.push(next);
                }
            }
            Some('u') if is_unicode_escape(&text[idx + 1..]) => {
                out.push('\\');
            }
            _ => out.push_str("\\\\"),
        }
    }

    out
}

/// `rest` starts right after the backslash: `uXXXX`.
fn is_unicode_escape(rest: &str) -> bool {
    let bytes = rest.as_bytes();
    bytes.len() >= 5 && bytes[1..5].iter().all(u8::is_ascii_hexdigit)
}

/// Parse a raw service response into a validated [`Judgment`].
pub(crate) fn parse_judgment(text: &str) -> Result<Judgment, FailureReason> {
    let cleaned = clean_response(text);
    let raw: RawJudgment = serde_json::from_str(&cleaned)
        .map_err(|e| FailureReason::InvalidJson(e.to_string()))?;

    let reference = transliteration(raw.reference, "reference")?;
    let dummy = transliteration(raw.dummy, "dummy")?;
    let is_confusable = raw
        .potentially_confusing
        .ok_or(FailureReason::MissingField("potentially_confusing"))?;
    let categories = raw
        .confusion_type
        .ok_or(FailureReason::MissingField("confusion_type"))?
        .iter()
        .map(|name| name.parse::<ConfusionCategory>())
        .collect::<Result<BTreeSet<_>, _>>()?;
    let score = raw
        .confusion_score
        .ok_or(FailureReason::MissingField("confusion_score"))?;
    let score = ConfusionScore::new(score)?;

    Judgment::new(reference, dummy, is_confusable, categories, score).map_err(FailureReason::from)
}

fn transliteration(
    raw: Option<RawTransliteration>,
    side: &'static str,
) -> Result<Transliteration, FailureReason> {
    let (hindi_field, regional_field) = match side {
        "reference" => ("reference.hindi", "reference.regional"),
        _ => ("dummy.hindi", "dummy.regional"),
    };
    let raw = raw.ok_or(FailureReason::MissingField(side))?;
    let hindi = raw.hindi.ok_or(FailureReason::MissingField(hindi_field))?;
    let regional = raw
        .regional
        .ok_or(FailureReason::MissingField(regional_field))?;
    Ok(Transliteration::new(hindi, regional))
}
