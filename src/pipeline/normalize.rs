//! Normalisation: turn raw model text into a complete [`AnalysisResult`].
//!
//! Models regularly wrap JSON in ```` ```json ```` fences, add a sentence
//! before the object, return `"yes"` instead of `true`, or spell "not
//! available" in the label's own language. None of that is an error here:
//! [`normalize`] never fails, it always returns all ten allergen flags and
//! all six nutrient values, and it records what went wrong as a diagnostic
//! string on the result.
//!
//! ## Steps
//!
//! 1. Repair ([`RepairMode::Lenient`]): trim, drop outer code fences, slice
//!    from the first `{` to the last `}`
//! 2. Parse as JSON
//! 3. Coerce each allergen to a bool and each nutrient to a display string
//! 4. Clean nutrient strings with [`normalize_value`]

use crate::output::{
    Allergen, AllergenRecord, AnalysisMetadata, AnalysisResult, Confidence, Nutrient,
    NutritionRecord, NOT_AVAILABLE,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Longest raw response kept on an error result, in characters.
pub const RAW_RESPONSE_LIMIT: usize = 1000;

/// How much repair is applied before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairMode {
    /// Strip fences and surrounding prose. (default)
    #[default]
    Lenient,
    /// Parse the trimmed response as-is; for providers with a JSON mode.
    Strict,
}

/// Recovered problems; each becomes the `error` string of the result.
#[derive(Debug, Error)]
enum NormalizeError {
    #[error("Failed to parse LLM response as JSON")]
    Parse(#[source] serde_json::Error),

    #[error("Data extraction error")]
    Shape(&'static str),
}

/// Normalise with [`RepairMode::Lenient`].
pub fn normalize(raw: &str) -> AnalysisResult {
    normalize_with(raw, RepairMode::Lenient)
}

/// Normalise `raw` model output into a complete result.
pub fn normalize_with(raw: &str, mode: RepairMode) -> AnalysisResult {
    match parse_sections(raw, mode) {
        Ok(result) => {
            debug!(
                "Parsed model JSON: {} allergen(s) present",
                result.allergens.present().len()
            );
            result
        }
        Err(e) => {
            match &e {
                NormalizeError::Parse(source) => warn!("JSON decode failed: {}", source),
                NormalizeError::Shape(what) => warn!("Unexpected model output shape: {}", what),
            }
            AnalysisResult::empty_with_error(e.to_string(), Some(truncate_raw(raw)))
        }
    }
}

fn parse_sections(raw: &str, mode: RepairMode) -> Result<AnalysisResult, NormalizeError> {
    let candidate = match mode {
        RepairMode::Lenient => repair(raw),
        RepairMode::Strict => raw.trim(),
    };
    let value: Value = serde_json::from_str(candidate).map_err(NormalizeError::Parse)?;
    let root = value
        .as_object()
        .ok_or(NormalizeError::Shape("top level is not an object"))?;

    let empty = Map::new();
    let allergens = section(root, "allergens")?.unwrap_or(&empty);
    let nutrients = section(root, "nutritional_values")?.unwrap_or(&empty);

    let mut record = AllergenRecord::default();
    for allergen in Allergen::ALL {
        record.set(allergen, allergens.get(allergen.key()).is_some_and(presence_flag));
    }

    let mut values = NutritionRecord::default();
    for nutrient in Nutrient::ALL {
        if let Some(v) = nutrients.get(nutrient.key()) {
            values.set(nutrient, display_value(v));
        }
    }

    Ok(AnalysisResult {
        allergens: record,
        nutritional_values: values,
        metadata: metadata(root.get("metadata")),
        error: None,
        raw_response: None,
    })
}

/// A missing section is backfilled; an explicit `null` or any other
/// non-object is a shape error.
fn section<'a>(
    root: &'a Map<String, Value>,
    key: &'static str,
) -> Result<Option<&'a Map<String, Value>>, NormalizeError> {
    match root.get(key) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(NormalizeError::Shape(key)),
    }
}

fn metadata(value: Option<&Value>) -> AnalysisMetadata {
    let mut meta = AnalysisMetadata::default();
    let Some(Value::Object(map)) = value else {
        return meta;
    };
    if let Some(v) = map.get("per_100g") {
        meta.per_100g = presence_flag(v);
    }
    if let Some(Value::String(s)) = map.get("language_detected") {
        if !s.trim().is_empty() {
            meta.language_detected = s.trim().to_string();
        }
    }
    if let Some(Value::String(s)) = map.get("confidence") {
        meta.confidence = Confidence::parse_lenient(s);
    }
    meta
}

/// Trim, drop outer fences, then slice from the first `{` to the last `}`.
///
/// A `{` that only appears after the last `}` leaves nothing to slice, so
/// the result is empty and the parse fails.
fn repair(raw: &str) -> &str {
    let mut clean = raw.trim();

    if clean.starts_with("```") {
        let lines: Vec<&str> = clean.split('\n').collect();
        if lines.len() > 2 {
            let start = lines[0].len() + 1;
            let end = clean.len() - lines[lines.len() - 1].len() - 1;
            clean = &clean[start..end];
        }
    }

    if let (Some(start), Some(end)) = (clean.find('{'), clean.rfind('}')) {
        clean = if start < end { &clean[start..=end] } else { "" };
    }
    clean
}

fn truncate_raw(raw: &str) -> String {
    raw.chars().take(RAW_RESPONSE_LIMIT).collect()
}

/// Interpret a loosely-typed JSON value as a presence flag.
///
/// Booleans as-is; strings `true`/`yes`/`y`/`1`/`present`/`contains`
/// (case-insensitive); non-zero numbers. Anything else is absent.
pub fn presence_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "y" | "1" | "present" | "contains"
        ),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Render a loosely-typed nutrient value as a cleaned display string.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => normalize_value(s),
        Value::Number(n) => normalize_value(&n.to_string()),
        _ => NOT_AVAILABLE.to_string(),
    }
}

// ── Value normaliser ─────────────────────────────────────────────────────

static RE_SALT_NOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\((as\s+)?salt\)|\((comme\s+)?sel\)|\((als\s+)?salz\)|\(sóként\)")
        .unwrap()
});

/// Case-folded phrases meaning "no value" in en/fr/de/hu.
const NOT_AVAILABLE_PHRASES: &[&str] = &[
    "not specified",
    "not available",
    "n/a",
    "na",
    "",
    "non disponible",
    "non spécifié",
    "nicht verfügbar",
    "nicht angegeben",
    "nem elérhető",
    "nem megadva",
    "unknown",
    "inconnu",
    "unbekannt",
    "ismeretlen",
    "none",
    "null",
    "-",
    "--",
    "—",
];

const NOT_AVAILABLE_PREFIXES: &[&str] = &["not ", "non ", "nem ", "nicht ", "no ", "n/a"];

/// Clean one nutrient display string.
///
/// Strips salt-equivalence notes, maps every "no value" spelling to
/// [`NOT_AVAILABLE`], and otherwise returns the trimmed value verbatim.
/// Idempotent: `normalize_value(normalize_value(x)) == normalize_value(x)`.
pub fn normalize_value(value: &str) -> String {
    let stripped = RE_SALT_NOTE.replace_all(value.trim(), "");
    let val = stripped.trim();
    let lower = val.to_lowercase();

    if NOT_AVAILABLE_PHRASES.contains(&lower.as_str())
        || NOT_AVAILABLE_PREFIXES.iter().any(|p| lower.starts_with(p))
    {
        return NOT_AVAILABLE.to_string();
    }
    val.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_absent(r: &AnalysisResult) -> bool {
        Allergen::ALL.iter().all(|a| !r.allergens.get(*a))
            && Nutrient::ALL.iter().all(|n| r.nutritional_values.is_missing(*n))
    }

    #[test]
    fn fenced_response_is_parsed() {
        let raw = "```json\n{\"allergens\":{\"milk\":true},\"nutritional_values\":{\"energy\":\"250 kcal\"}}\n```";
        let r = normalize(raw);
        assert!(r.is_success());
        assert!(r.allergens.milk);
        assert_eq!(r.allergens.present(), vec![Allergen::Milk]);
        assert_eq!(r.nutritional_values.energy, "250 kcal");
        assert!(r.nutritional_values.is_missing(Nutrient::Fat));
    }

    #[test]
    fn fenced_and_bare_normalise_identically() {
        let body = r#"{"allergens":{"gluten":true,"soy":"yes"},"nutritional_values":{"sugar":"5 g","sodium":"0.2 g (as salt)"}}"#;
        let fenced = format!("```json\n{body}\n```");
        assert_eq!(normalize(body), normalize(&fenced));
    }

    #[test]
    fn prose_around_json_is_ignored() {
        let raw = "Here is the data:\n{\"allergens\":{\"egg\":true}}\nHope this helps!";
        assert!(normalize(raw).allergens.egg);
    }

    #[test]
    fn malformed_json_yields_empty_record_with_error() {
        let raw = "I could not read this label, sorry.";
        let r = normalize(raw);
        assert_eq!(r.error.as_deref(), Some("Failed to parse LLM response as JSON"));
        assert_eq!(r.raw_response.as_deref(), Some(raw));
        assert_eq!(r.metadata.confidence, Confidence::Low);
        assert!(all_absent(&r));
    }

    #[test]
    fn raw_response_is_capped() {
        let raw = "x".repeat(5000);
        let r = normalize(&raw);
        assert_eq!(r.raw_response.map(|s| s.chars().count()), Some(RAW_RESPONSE_LIMIT));
    }

    #[test]
    fn wrong_shape_is_a_data_extraction_error() {
        let r = normalize(r#"{"allergens": ["milk"], "nutritional_values": {}}"#);
        assert_eq!(r.error.as_deref(), Some("Data extraction error"));
        assert!(all_absent(&r));

        let r = normalize("[1, 2, 3]");
        assert_eq!(r.error.as_deref(), Some("Data extraction error"));
    }

    #[test]
    fn null_section_is_a_data_extraction_error() {
        let r = normalize(r#"{"allergens": null, "nutritional_values": {"energy": "250 kcal"}}"#);
        assert_eq!(r.error.as_deref(), Some("Data extraction error"));
        assert!(all_absent(&r));

        let r = normalize(r#"{"allergens": {"milk": true}, "nutritional_values": null}"#);
        assert_eq!(r.error.as_deref(), Some("Data extraction error"));
    }

    #[test]
    fn inverted_braces_fail_to_parse() {
        assert_eq!(repair("} oops {"), "");
        let r = normalize("} oops {");
        assert_eq!(r.error.as_deref(), Some("Failed to parse LLM response as JSON"));
        assert_eq!(r.raw_response.as_deref(), Some("} oops {"));
    }

    #[test]
    fn missing_sections_are_backfilled() {
        let r = normalize("{}");
        assert!(r.is_success());
        assert!(all_absent(&r));
        assert!(r.metadata.per_100g);
        assert_eq!(r.metadata.language_detected, "unknown");
        assert_eq!(r.metadata.confidence, Confidence::Medium);
    }

    #[test]
    fn model_metadata_is_kept() {
        let r = normalize(
            r#"{"metadata":{"per_100g":false,"language_detected":"hu","confidence":"high"}}"#,
        );
        assert!(!r.metadata.per_100g);
        assert_eq!(r.metadata.language_detected, "hu");
        assert_eq!(r.metadata.confidence, Confidence::High);
    }

    #[test]
    fn allergen_values_are_coerced() {
        let r = normalize(
            r#"{"allergens":{"gluten":"Yes","egg":1,"fish":0,"soy":"no","milk":null,"celery":"contains","sesame":true}}"#,
        );
        assert!(r.allergens.gluten);
        assert!(r.allergens.egg);
        assert!(!r.allergens.fish);
        assert!(!r.allergens.soy);
        assert!(!r.allergens.milk);
        assert!(r.allergens.celery);
    }

    #[test]
    fn nutrient_values_are_coerced() {
        let r = normalize(r#"{"nutritional_values":{"energy":250,"fat":null,"protein":" 8 g ","sugar":"n/a"}}"#);
        assert_eq!(r.nutritional_values.energy, "250");
        assert_eq!(r.nutritional_values.fat, NOT_AVAILABLE);
        assert_eq!(r.nutritional_values.protein, "8 g");
        assert_eq!(r.nutritional_values.sugar, NOT_AVAILABLE);
    }

    #[test]
    fn strict_mode_skips_repair() {
        let raw = "```json\n{\"allergens\":{\"milk\":true}}\n```";
        let r = normalize_with(raw, RepairMode::Strict);
        assert!(r.error.is_some());
        assert!(normalize_with("{\"allergens\":{\"milk\":true}}", RepairMode::Strict).allergens.milk);
    }

    #[test]
    fn not_available_phrases_map_to_sentinel() {
        for v in ["n/a", "None", "—", "nem elérhető", "nicht verfügbar", "  ", "Not stated", "NA"] {
            assert_eq!(normalize_value(v), NOT_AVAILABLE, "input {v:?}");
        }
    }

    #[test]
    fn salt_notes_are_stripped() {
        assert_eq!(normalize_value("0.5 g (as salt)"), "0.5 g");
        assert_eq!(normalize_value("0,5 g (comme sel)"), "0,5 g");
        assert_eq!(normalize_value("0,5 g (als Salz)"), "0,5 g");
        assert_eq!(normalize_value("0,5 g (sóként)"), "0,5 g");
        assert_eq!(normalize_value("0.5 g (SALT)"), "0.5 g");
    }

    #[test]
    fn real_values_pass_through() {
        assert_eq!(normalize_value(" 1046 kJ / 250 kcal "), "1046 kJ / 250 kcal");
        assert_eq!(normalize_value("<0.5 g"), "<0.5 g");
    }

    #[test]
    fn normalize_value_is_idempotent() {
        for v in ["0.5 g (as salt)", "n/a", " 12 g ", "nicht angegeben", "3 g (sel)", "Not available"] {
            let once = normalize_value(v);
            assert_eq!(normalize_value(&once), once, "input {v:?}");
        }
    }
}
