//! Progress-callback trait for analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgress>`] via
//! [`crate::analyze::Analyzer::with_progress`] to receive events as one
//! label moves through the pipeline. The CLI uses it to drive a spinner; the
//! HTTP service leaves the no-op default in place.
//!
//! # Example
//!
//! ```rust
//! use beaware::{AnalysisProgress, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct StageLog(Mutex<Vec<Stage>>);
//!
//! impl AnalysisProgress for StageLog {
//!     fn on_stage(&self, stage: Stage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log = Arc::new(StageLog::default());
//! log.on_stage(Stage::ReadingText);
//! assert_eq!(log.0.lock().unwrap().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

/// Coarse pipeline stage, reported once on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading the embedded text layer.
    ReadingText,
    /// Rasterising pages and running OCR.
    Recognizing,
    /// Waiting for the model.
    QueryingModel,
    /// Parsing and cleaning the model response.
    Normalizing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::ReadingText => "Reading text layer",
            Stage::Recognizing => "Running OCR",
            Stage::QueryingModel => "Querying model",
            Stage::Normalizing => "Normalizing response",
        };
        f.write_str(s)
    }
}

/// Called by the analyzer as it processes a label.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgress: Send + Sync {
    /// Called when the pipeline enters `stage`.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called before OCR runs on a page.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages being recognised
    fn on_recognition_page(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called before each model attempt (1-indexed).
    fn on_model_attempt(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// Called once with the final outcome. `error` mirrors `AnalysisResult::error`.
    fn on_complete(&self, error: Option<&str>) {
        let _ = error;
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgress;

impl AnalysisProgress for NoopProgress {}

/// Convenience alias for the shared callback type.
pub type ProgressCallback = Arc<dyn AnalysisProgress>;
