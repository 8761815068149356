//! Localised PDF reports of an analysis.
//!
//! Rendering is split in two:
//!
//! 1. [`build_document`] turns report data into a small layout-free model
//!    ([`ReportDocument`]): a title plus sections that are either a two-column
//!    table or a one-line note. All localisation happens here.
//! 2. [`pdf::write_pdf`] lays that model out on A4 pages with `lopdf`.
//!
//! Report data comes either from an [`AnalysisResult`] or from a loose JSON
//! payload posted by a client ([`ReportRequest::from_value`]); neither path
//! fails on missing data.

pub mod pdf;
pub mod translations;

use crate::error::BeawareError;
use crate::output::{AnalysisResult, Nutrient, NOT_AVAILABLE};
use crate::pipeline::normalize::{display_value, presence_flag};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;
use translations::{strings, Strings};

/// File name used for downloaded reports.
pub const REPORT_FILE_NAME: &str = "be_aware_report.pdf";

// ── Model ────────────────────────────────────────────────────────────────

/// Layout-free report content.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub heading: String,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionBody {
    Table {
        header: [String; 2],
        rows: Vec<[Cell; 2]>,
        accent: Accent,
    },
    Note(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    /// Rendered as a green tick or a red cross.
    Presence(bool),
}

/// Header row colour of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accent {
    Blue,
    Green,
}

// ── Input ────────────────────────────────────────────────────────────────

/// Report data as posted by a client.
///
/// Accepts `allergens` / `nutritional_values` at the top level or nested
/// under `data` (the shape of an upload response), arbitrary allergen keys,
/// and non-string nutrient values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportRequest {
    pub language: String,
    /// Allergen key → presence. Sorted by key.
    pub allergens: BTreeMap<String, bool>,
    /// Raw nutrient values by key.
    pub nutritional_values: Map<String, Value>,
}

impl ReportRequest {
    /// Parse a loose payload. Never fails; unusable parts are treated as absent.
    pub fn from_value(payload: &Value) -> Self {
        let data = payload.get("data");
        let language = payload
            .get("language")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("en")
            .to_string();

        let allergens = non_empty_object(payload.get("allergens"))
            .or_else(|| non_empty_object(data.and_then(|d| d.get("allergens"))))
            .map(|m| {
                m.iter()
                    .map(|(k, v)| (k.clone(), presence_flag(v)))
                    .collect()
            })
            .unwrap_or_default();

        let nutritional_values = non_empty_object(payload.get("nutritional_values"))
            .or_else(|| non_empty_object(data.and_then(|d| d.get("nutritional_values"))))
            .cloned()
            .unwrap_or_default();

        Self {
            language,
            allergens,
            nutritional_values,
        }
    }

    /// Report data for a typed analysis result.
    pub fn from_result(result: &AnalysisResult, language: &str) -> Self {
        // Serialising a plain struct of bools and strings cannot fail.
        let value = serde_json::to_value(result).unwrap_or(Value::Null);
        let mut req = Self::from_value(&value);
        req.language = language.to_string();
        req
    }
}

fn non_empty_object(v: Option<&Value>) -> Option<&Map<String, Value>> {
    v.and_then(Value::as_object).filter(|m| !m.is_empty())
}

// ── Build ────────────────────────────────────────────────────────────────

/// Localise report data into a [`ReportDocument`].
pub fn build_document(req: &ReportRequest) -> ReportDocument {
    let tr = strings(&req.language);
    ReportDocument {
        title: tr.title.to_string(),
        sections: vec![allergen_section(req, tr), nutrition_section(req, tr)],
    }
}

fn allergen_section(req: &ReportRequest, tr: &Strings) -> Section {
    let body = if req.allergens.is_empty() {
        SectionBody::Note(tr.no_allergens.to_string())
    } else {
        SectionBody::Table {
            header: [tr.col_allergen.to_string(), tr.col_present.to_string()],
            rows: req
                .allergens
                .iter()
                .map(|(key, present)| {
                    [
                        Cell::Text(tr.allergen_label_for_key(key).to_string()),
                        Cell::Presence(*present),
                    ]
                })
                .collect(),
            accent: Accent::Blue,
        }
    };
    Section {
        heading: tr.allergens.to_string(),
        body,
    }
}

fn nutrition_section(req: &ReportRequest, tr: &Strings) -> Section {
    let body = if req.nutritional_values.is_empty() {
        SectionBody::Note(tr.no_nutrition.to_string())
    } else {
        SectionBody::Table {
            header: [tr.col_nutrient.to_string(), tr.col_value.to_string()],
            rows: Nutrient::ALL
                .iter()
                .map(|n| {
                    let value = req
                        .nutritional_values
                        .get(n.key())
                        .map(display_value)
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                    let value = if value == NOT_AVAILABLE {
                        tr.not_available.to_string()
                    } else {
                        value
                    };
                    [
                        Cell::Text(tr.nutrient_label(*n).to_string()),
                        Cell::Text(value),
                    ]
                })
                .collect(),
            accent: Accent::Green,
        }
    };
    Section {
        heading: tr.nutrition.to_string(),
        body,
    }
}

// ── Render ───────────────────────────────────────────────────────────────

/// Render a report for an analysis result.
pub fn render(result: &AnalysisResult, language: &str) -> Result<Vec<u8>, BeawareError> {
    render_request(&ReportRequest::from_result(result, language))
}

/// Render a report from a loose JSON payload.
pub fn render_payload(payload: &Value) -> Result<Vec<u8>, BeawareError> {
    render_request(&ReportRequest::from_value(payload))
}

pub fn render_request(req: &ReportRequest) -> Result<Vec<u8>, BeawareError> {
    info!("Generating PDF with language: {}", req.language);
    pdf::write_pdf(&build_document(req))
}
