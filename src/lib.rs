//! # beaware
//!
//! Extract allergen flags and nutrition values from food-label PDFs and
//! render them as localised PDF reports.
//!
//! Labels come in every shape: born-digital PDFs with a clean text layer,
//! phone scans with none, and multilingual packaging where the same table is
//! printed in four languages. This crate reads whatever text the PDF carries,
//! falls back to OCR for pages that carry too little, and asks an LLM to
//! fill a fixed schema (ten EU allergens, six nutrients per 100 g). The
//! model's reply is then repaired and coerced so callers always get the same
//! shape back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      local file, URL, or uploaded bytes
//!  ├─ 2. Acquire    per-page text layer via pdfium (spawn_blocking)
//!  │                └─ sparse page → rasterise → tesseract
//!  ├─ 3. Prompt     label text (middle-truncated) into the extraction prompt
//!  ├─ 4. LLM        one call with timeout, retried with exponential backoff
//!  ├─ 5. Normalise  JSON repair, bool/string coercion, "Not available"
//!  └─ 6. Report     optional localised PDF (en / fr / de / hu)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beaware::{Analyzer, AnalyzerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analyzer = Analyzer::from_config(AnalyzerConfig::from_env()?);
//!     let result = analyzer.analyze_input("label.pdf", "en").await?;
//!     for allergen in result.allergens.present() {
//!         println!("contains {}", allergen.key());
//!     }
//!     let report = beaware::report::render(&result, "de")?;
//!     std::fs::write("report.pdf", report)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `beaware` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | HTTP service under [`server`] (axum + tower-http) |
//!
//! For library-only use:
//! ```toml
//! beaware = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_sync, Analyzer};
pub use config::{AnalyzerConfig, AnalyzerConfigBuilder, RasterFormat};
pub use error::{BeawareError, RecognitionError};
pub use output::{
    Allergen, AllergenRecord, AnalysisMetadata, AnalysisResult, Confidence, ExtractedText,
    Nutrient, NutritionRecord, NOT_AVAILABLE,
};
pub use pipeline::llm::ModelClient;
pub use pipeline::normalize::RepairMode;
pub use progress::{AnalysisProgress, NoopProgress, ProgressCallback, Stage};
