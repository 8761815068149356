//! Text acquisition: embedded text layer first, OCR when it is too thin.
//!
//! Many food labels are exported from design tools with a proper text layer;
//! many others are phone scans. The structural pass is cheap and exact, so
//! it always runs first. OCR only runs when the structural text (trimmed) is
//! shorter than `min_text_length` characters.
//!
//! Pages are tagged so the model can see where each page starts:
//!
//! ```text
//! --- Page 1 ---
//! Zutaten: Weizenmehl, Zucker, …
//! --- Page 2 (OCR) ---
//! Nährwerte pro 100 g …
//! ```
//!
//! ## Failure policy
//!
//! Structural failures are swallowed (a page that cannot be read simply
//! contributes nothing). Once OCR has started, any rasterisation or
//! recognition failure aborts the acquisition: a half-recognised label is
//! worse than a clear error.

use crate::config::AnalyzerConfig;
use crate::error::BeawareError;
use crate::output::ExtractedText;
use crate::pipeline::extract::PageSource;
use crate::pipeline::ocr::Recognizer;
use crate::progress::{AnalysisProgress, Stage};
use std::sync::Arc;
use tracing::{info, warn};

/// Settings the acquisition needs, copied out of [`AnalyzerConfig`].
#[derive(Debug, Clone)]
pub struct AcquireSettings {
    pub min_text_length: usize,
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub ocr_languages: String,
}

impl AcquireSettings {
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            min_text_length: config.min_text_length,
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            ocr_languages: config.ocr_languages.clone(),
        }
    }
}

/// Async wrapper: runs [`acquire_text_blocking`] on the blocking pool.
pub async fn acquire_text(
    pdf: Arc<Vec<u8>>,
    pages: Arc<dyn PageSource>,
    recognizer: Arc<dyn Recognizer>,
    settings: AcquireSettings,
    progress: Arc<dyn AnalysisProgress>,
) -> Result<ExtractedText, BeawareError> {
    tokio::task::spawn_blocking(move || {
        acquire_text_blocking(&pdf, pages.as_ref(), recognizer.as_ref(), &settings, progress.as_ref())
    })
    .await
    .map_err(|e| BeawareError::Internal(format!("Text acquisition task panicked: {}", e)))?
}

/// Acquire label text from `pdf`.
///
/// Returns trimmed, page-tagged text that is never empty, or
/// [`BeawareError::ExtractionFailed`].
pub fn acquire_text_blocking(
    pdf: &[u8],
    pages: &dyn PageSource,
    recognizer: &dyn Recognizer,
    settings: &AcquireSettings,
    progress: &dyn AnalysisProgress,
) -> Result<ExtractedText, BeawareError> {
    progress.on_stage(Stage::ReadingText);

    let mut text = String::new();
    let mut page_count = 0;

    match pages.page_texts(pdf) {
        Ok(texts) => {
            page_count = texts.len();
            for (idx, page_text) in texts.into_iter().enumerate() {
                match page_text {
                    Ok(t) if !t.trim().is_empty() => {
                        text.push_str(&format!("\n--- Page {} ---\n{}", idx + 1, t));
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Text layer unreadable on page {}: {}", idx + 1, e),
                }
            }
            if !text.trim().is_empty() {
                info!("Text layer yielded {} characters", text.chars().count());
            }
        }
        Err(e) => warn!("Text layer extraction error: {}", e),
    }

    let used_recognition = text.trim().chars().count() < settings.min_text_length;
    if used_recognition {
        progress.on_stage(Stage::Recognizing);
        info!("Falling back to OCR (languages={})", settings.ocr_languages);

        let images = pages
            .rasterize(pdf, settings.dpi, settings.max_rendered_pixels)
            .map_err(|e| ocr_failed(&e))?;
        info!("Converted PDF to {} image(s) for OCR", images.len());
        page_count = page_count.max(images.len());

        let total = images.len();
        for (idx, image) in images.iter().enumerate() {
            let page_num = idx + 1;
            info!("OCR page {}/{}", page_num, total);
            progress.on_recognition_page(page_num, total);

            let page_text = recognizer
                .recognize(image, &settings.ocr_languages, page_num)
                .map_err(|e| ocr_failed(&e))?;
            if !page_text.trim().is_empty() {
                text.push_str(&format!("\n--- Page {} (OCR) ---\n{}", page_num, page_text));
            }
        }
        info!("OCR extraction finished (total chars={})", text.chars().count());
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BeawareError::ExtractionFailed {
            reason: "No text could be extracted from the PDF (text layer and OCR both failed)."
                .to_string(),
        });
    }

    Ok(ExtractedText {
        text: trimmed.to_string(),
        used_recognition,
        page_count,
    })
}

fn ocr_failed(e: &dyn std::fmt::Display) -> BeawareError {
    BeawareError::ExtractionFailed {
        reason: format!("OCR processing failed: {}", e),
    }
}
