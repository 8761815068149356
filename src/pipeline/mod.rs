//! Pipeline stages for label analysis.
//!
//! Each submodule implements exactly one step, so each can be tested with
//! fakes for its neighbours.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ acquire ──────────────▶ llm ──▶ normalize
//! (path/URL) (extract, then ocr)   (model)  (JSON repair + cleanup)
//! ```
//!
//! 1. [`input`]     — read a path or URL into memory and check the `%PDF` magic
//! 2. [`extract`]   — pdfium access behind the [`extract::PageSource`] seam
//! 3. [`ocr`]       — Tesseract behind the [`ocr::Recognizer`] seam
//! 4. [`acquire`]   — text layer first, OCR fallback; runs in `spawn_blocking`
//! 5. [`llm`]       — the only stage with network I/O; retry with backoff
//! 6. [`normalize`] — turn whatever the model said into a complete record

pub mod acquire;
pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod ocr;
