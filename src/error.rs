//! Error types for the beaware library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`BeawareError`] — **Fatal for one request**: the pipeline stage cannot
//!   produce anything useful (no text in the PDF, no model credential, every
//!   model attempt failed). Returned as `Err(BeawareError)` from the stage
//!   functions; the orchestrator in [`crate::analyze`] folds it into an
//!   error-tagged [`crate::output::AnalysisResult`] so clients always get a
//!   complete record.
//!
//! * [`RecognitionError`] — the OCR engine seam. Kept separate because the
//!   engine is an external program and its failures (binary missing, bad
//!   language pack) need their own hints.
//!
//! * Malformed model output is never an error at all: the normaliser in
//!   [`crate::pipeline::normalize`] recovers locally and reports the problem
//!   as a diagnostic string inside the result.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the beaware library.
#[derive(Debug, Error)]
pub enum BeawareError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The orchestrator was handed zero bytes.
    #[error("Empty PDF bytes provided")]
    EmptyInput,

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("'{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF / text acquisition errors ────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// Neither the text layer nor OCR produced usable text.
    #[error("{reason}")]
    ExtractionFailed { reason: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No credential is configured for the model provider.
    #[error("LLM client not configured ({provider}). {hint}")]
    ModelUnavailable { provider: String, hint: String },

    /// Every attempt against the model failed.
    #[error("LLM extraction failed after {attempts} attempt(s): {last_error}")]
    ModelCallFailed { attempts: u32, last_error: String },

    // ── Report errors ─────────────────────────────────────────────────────
    /// The report document could not be assembled or serialised.
    #[error("PDF generation failed: {0}")]
    ReportFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or install libpdfium into a system\n\
library directory (/usr/lib, /usr/local/lib) or the working directory.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the OCR engine.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The engine binary could not be started.
    #[error("OCR engine not available: {0}")]
    EngineNotAvailable(String),

    /// The engine ran but exited unsuccessfully.
    #[error("OCR failed on page {page}: {detail}")]
    Failed { page: usize, detail: String },

    /// The page image could not be written for the engine.
    #[error("Image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
