//! Structured records produced by the analysis pipeline.
//!
//! The allergen and nutrient sets are closed. Both records are plain structs
//! with one field per key, so "all keys always present" holds by
//! construction, unknown upstream keys are dropped on deserialisation, and
//! missing keys take their absent value (`false` / [`NOT_AVAILABLE`]).

use serde::{Deserialize, Serialize};

/// Canonical "not available" sentinel for nutrient values.
///
/// Localised only at render time; internally there is exactly one value.
pub const NOT_AVAILABLE: &str = "Not available";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

// ── Allergens ────────────────────────────────────────────────────────────

/// One of the ten tracked allergens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Allergen {
    Gluten,
    Egg,
    Crustaceans,
    Fish,
    Peanut,
    Soy,
    Milk,
    TreeNuts,
    Celery,
    Mustard,
}

impl Allergen {
    /// All allergens, in prompt/serialisation order.
    pub const ALL: [Allergen; 10] = [
        Allergen::Gluten,
        Allergen::Egg,
        Allergen::Crustaceans,
        Allergen::Fish,
        Allergen::Peanut,
        Allergen::Soy,
        Allergen::Milk,
        Allergen::TreeNuts,
        Allergen::Celery,
        Allergen::Mustard,
    ];

    /// JSON key used by the model contract and the API.
    pub fn key(&self) -> &'static str {
        match self {
            Allergen::Gluten => "gluten",
            Allergen::Egg => "egg",
            Allergen::Crustaceans => "crustaceans",
            Allergen::Fish => "fish",
            Allergen::Peanut => "peanut",
            Allergen::Soy => "soy",
            Allergen::Milk => "milk",
            Allergen::TreeNuts => "tree_nuts",
            Allergen::Celery => "celery",
            Allergen::Mustard => "mustard",
        }
    }

    pub fn from_key(key: &str) -> Option<Allergen> {
        Allergen::ALL.into_iter().find(|a| a.key() == key)
    }
}

/// Presence flag for every tracked allergen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllergenRecord {
    pub gluten: bool,
    pub egg: bool,
    pub crustaceans: bool,
    pub fish: bool,
    pub peanut: bool,
    pub soy: bool,
    pub milk: bool,
    pub tree_nuts: bool,
    pub celery: bool,
    pub mustard: bool,
}

impl AllergenRecord {
    pub fn get(&self, allergen: Allergen) -> bool {
        match allergen {
            Allergen::Gluten => self.gluten,
            Allergen::Egg => self.egg,
            Allergen::Crustaceans => self.crustaceans,
            Allergen::Fish => self.fish,
            Allergen::Peanut => self.peanut,
            Allergen::Soy => self.soy,
            Allergen::Milk => self.milk,
            Allergen::TreeNuts => self.tree_nuts,
            Allergen::Celery => self.celery,
            Allergen::Mustard => self.mustard,
        }
    }

    pub fn set(&mut self, allergen: Allergen, present: bool) {
        let slot = match allergen {
            Allergen::Gluten => &mut self.gluten,
            Allergen::Egg => &mut self.egg,
            Allergen::Crustaceans => &mut self.crustaceans,
            Allergen::Fish => &mut self.fish,
            Allergen::Peanut => &mut self.peanut,
            Allergen::Soy => &mut self.soy,
            Allergen::Milk => &mut self.milk,
            Allergen::TreeNuts => &mut self.tree_nuts,
            Allergen::Celery => &mut self.celery,
            Allergen::Mustard => &mut self.mustard,
        };
        *slot = present;
    }

    /// Allergens flagged as present, in canonical order.
    pub fn present(&self) -> Vec<Allergen> {
        Allergen::ALL.into_iter().filter(|a| self.get(*a)).collect()
    }
}

// ── Nutrients ────────────────────────────────────────────────────────────

/// One of the six tracked nutrients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nutrient {
    Energy,
    Fat,
    Carbohydrate,
    Sugar,
    Protein,
    Sodium,
}

impl Nutrient {
    /// All nutrients, in the canonical display order.
    pub const ALL: [Nutrient; 6] = [
        Nutrient::Energy,
        Nutrient::Fat,
        Nutrient::Carbohydrate,
        Nutrient::Sugar,
        Nutrient::Protein,
        Nutrient::Sodium,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Nutrient::Energy => "energy",
            Nutrient::Fat => "fat",
            Nutrient::Carbohydrate => "carbohydrate",
            Nutrient::Sugar => "sugar",
            Nutrient::Protein => "protein",
            Nutrient::Sodium => "sodium",
        }
    }
}

/// Display value for every tracked nutrient, per 100 g unless stated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionRecord {
    #[serde(default = "not_available")]
    pub energy: String,
    #[serde(default = "not_available")]
    pub fat: String,
    #[serde(default = "not_available")]
    pub carbohydrate: String,
    #[serde(default = "not_available")]
    pub sugar: String,
    #[serde(default = "not_available")]
    pub protein: String,
    #[serde(default = "not_available")]
    pub sodium: String,
}

impl Default for NutritionRecord {
    fn default() -> Self {
        Self {
            energy: not_available(),
            fat: not_available(),
            carbohydrate: not_available(),
            sugar: not_available(),
            protein: not_available(),
            sodium: not_available(),
        }
    }
}

impl NutritionRecord {
    pub fn get(&self, nutrient: Nutrient) -> &str {
        match nutrient {
            Nutrient::Energy => &self.energy,
            Nutrient::Fat => &self.fat,
            Nutrient::Carbohydrate => &self.carbohydrate,
            Nutrient::Sugar => &self.sugar,
            Nutrient::Protein => &self.protein,
            Nutrient::Sodium => &self.sodium,
        }
    }

    pub fn set(&mut self, nutrient: Nutrient, value: impl Into<String>) {
        let slot = match nutrient {
            Nutrient::Energy => &mut self.energy,
            Nutrient::Fat => &mut self.fat,
            Nutrient::Carbohydrate => &mut self.carbohydrate,
            Nutrient::Sugar => &mut self.sugar,
            Nutrient::Protein => &mut self.protein,
            Nutrient::Sodium => &mut self.sodium,
        };
        *slot = value.into();
    }

    /// True when `nutrient` holds the sentinel.
    pub fn is_missing(&self, nutrient: Nutrient) -> bool {
        self.get(nutrient) == NOT_AVAILABLE
    }
}

// ── Metadata & result ────────────────────────────────────────────────────

/// The model's self-reported confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Lenient parse; anything unrecognised is `Medium`.
    pub fn parse_lenient(s: &str) -> Confidence {
        match s.trim().to_lowercase().as_str() {
            "low" => Confidence::Low,
            "high" => Confidence::High,
            _ => Confidence::Medium,
        }
    }
}

/// Metadata attached to every [`AnalysisResult`].
///
/// `per_100g`, `language_detected` and `confidence` come from the model (or
/// defaults); the remaining fields are provenance stamped by the
/// orchestrator and always win over anything the model returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    #[serde(default = "default_true")]
    pub per_100g: bool,
    #[serde(default = "unknown")]
    pub language_detected: String,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub ocr_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_selected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn unknown() -> String {
    "unknown".to_string()
}

impl Default for AnalysisMetadata {
    fn default() -> Self {
        Self {
            per_100g: true,
            language_detected: unknown(),
            confidence: Confidence::Medium,
            ocr_used: false,
            language_selected: None,
            file_name: None,
            extracted_text_length: None,
            page_count: None,
        }
    }
}

/// Complete answer for one analysed label.
///
/// Always structurally valid: when a stage failed, the records hold their
/// absent values and `error` says why.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub allergens: AllergenRecord,
    #[serde(default)]
    pub nutritional_values: NutritionRecord,
    #[serde(default)]
    pub metadata: AnalysisMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl AnalysisResult {
    /// All-absent record with low confidence, annotated with `error`.
    pub fn empty_with_error(error: impl Into<String>, raw_response: Option<String>) -> Self {
        let error = error.into();
        Self {
            metadata: AnalysisMetadata {
                confidence: Confidence::Low,
                ..AnalysisMetadata::default()
            },
            error: (!error.is_empty()).then_some(error),
            raw_response: raw_response.filter(|r| !r.is_empty()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Overwrite provenance fields.
    ///
    /// `extracted` is `None` when text acquisition never succeeded; the
    /// result then reports `ocr_used=false` and no length or page count.
    pub fn stamp(&mut self, language: &str, file_name: &str, extracted: Option<&ExtractedText>) {
        self.metadata.ocr_used = extracted.is_some_and(|e| e.used_recognition);
        self.metadata.language_selected = Some(language.to_string());
        self.metadata.file_name = Some(file_name.to_string());
        self.metadata.extracted_text_length = extracted.map(ExtractedText::char_len);
        self.metadata.page_count = extracted.map(|e| e.page_count);
    }
}

/// Text pulled out of a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// Page-tagged, trimmed text. Never empty.
    pub text: String,
    /// True when the OCR fallback ran.
    pub used_recognition: bool,
    /// Pages in the source document.
    pub page_count: usize,
}

impl ExtractedText {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
