//! Analysis entry points: PDF bytes in, [`AnalysisResult`] out.
//!
//! [`Analyzer::analyze`] never returns an error. Every failure (empty
//! upload, unreadable scan, missing API key, model outage) is folded into an
//! error-tagged result that still carries all ten allergen flags, all six
//! nutrient values and the provenance metadata, so HTTP and CLI callers
//! handle exactly one shape.

use crate::config::AnalyzerConfig;
use crate::error::BeawareError;
use crate::output::{AnalysisResult, ExtractedText};
use crate::pipeline::acquire::{acquire_text, AcquireSettings};
use crate::pipeline::extract::{PageSource, PdfiumPages};
use crate::pipeline::input;
use crate::pipeline::llm::ModelClient;
use crate::pipeline::normalize::{normalize_with, RepairMode};
use crate::pipeline::ocr::{Recognizer, TesseractCli};
use crate::progress::{AnalysisProgress, NoopProgress, Stage};
use crate::prompts::{extraction_prompt, truncate_middle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared, cheaply clonable analysis service.
///
/// # Example
///
/// ```rust,no_run
/// use beaware::{Analyzer, AnalyzerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     // Reads OPENROUTER_API_KEY for the default provider.
///     let analyzer = Analyzer::from_config(AnalyzerConfig::from_env()?);
///     let bytes = std::fs::read("label.pdf")?;
///     let result = analyzer.analyze(&bytes, "label.pdf", "en").await;
///     println!("{}", serde_json::to_string_pretty(&result)?);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<AnalyzerConfig>,
    pages: Arc<dyn PageSource>,
    recognizer: Arc<dyn Recognizer>,
    model: ModelClient,
    repair: RepairMode,
    progress: Arc<dyn AnalysisProgress>,
}

impl Analyzer {
    /// Production wiring: pdfium, the tesseract CLI and the configured model.
    pub fn from_config(config: AnalyzerConfig) -> Self {
        let pages = Arc::new(PdfiumPages::new(config.pdfium_lib_path.clone()));
        let recognizer = Arc::new(TesseractCli::from_config(&config));
        let model = ModelClient::from_config(&config);
        Self::with_parts(config, pages, recognizer, model)
    }

    /// Explicit wiring, for tests and embedders with their own engines.
    pub fn with_parts(
        config: AnalyzerConfig,
        pages: Arc<dyn PageSource>,
        recognizer: Arc<dyn Recognizer>,
        model: ModelClient,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pages,
            recognizer,
            model,
            repair: RepairMode::default(),
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn AnalysisProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_repair_mode(mut self, mode: RepairMode) -> Self {
        self.repair = mode;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn model(&self) -> &ModelClient {
        &self.model
    }

    /// Analyse one label.
    ///
    /// # Arguments
    /// * `pdf`       — raw PDF bytes
    /// * `file_name` — name echoed back in the metadata
    /// * `language`  — UI language selected by the user, echoed back
    pub async fn analyze(&self, pdf: &[u8], file_name: &str, language: &str) -> AnalysisResult {
        let start = Instant::now();

        if pdf.is_empty() {
            let mut result = AnalysisResult::empty_with_error(BeawareError::EmptyInput.to_string(), None);
            result.stamp(language, file_name, None);
            self.progress.on_complete(result.error.as_deref());
            return result;
        }

        info!(
            "Analyze PDF bytes for file={} language={} size={} bytes",
            file_name,
            language,
            pdf.len()
        );

        let extracted = match self.acquire(pdf).await {
            Ok(t) => t,
            Err(e) => {
                error!("analyze failed: {}", e);
                let mut result = AnalysisResult::empty_with_error(e.to_string(), None);
                result.stamp(language, file_name, None);
                self.progress.on_complete(result.error.as_deref());
                return result;
            }
        };

        let mut result = match self.extract_fields(&extracted).await {
            Ok(r) => r,
            Err(e) => {
                error!("LLM call failed: {}", e);
                AnalysisResult::empty_with_error(e.to_string(), None)
            }
        };
        result.stamp(language, file_name, Some(&extracted));

        info!(
            "Analysis of {} finished in {:?} (ocr_used={}, error={:?})",
            file_name,
            start.elapsed(),
            extracted.used_recognition,
            result.error
        );
        self.progress.on_complete(result.error.as_deref());
        result
    }

    /// Load a path or URL, then [`analyze`](Self::analyze) it.
    ///
    /// Unlike `analyze`, input problems (missing file, not a PDF) are
    /// returned as errors because there is no upload to attach a result to.
    pub async fn analyze_input(
        &self,
        path_or_url: &str,
        language: &str,
    ) -> Result<AnalysisResult, BeawareError> {
        let loaded = input::load_input(path_or_url, self.config.api_timeout_secs.max(60)).await?;
        Ok(self.analyze(&loaded.bytes, &loaded.file_name, language).await)
    }

    /// Text acquisition only (no model call).
    pub async fn acquire(&self, pdf: &[u8]) -> Result<ExtractedText, BeawareError> {
        acquire_text(
            Arc::new(pdf.to_vec()),
            Arc::clone(&self.pages),
            Arc::clone(&self.recognizer),
            AcquireSettings::from_config(&self.config),
            Arc::clone(&self.progress),
        )
        .await
    }

    /// Prompt the model with `extracted` and normalise its reply.
    async fn extract_fields(&self, extracted: &ExtractedText) -> Result<AnalysisResult, BeawareError> {
        let text = truncate_middle(&extracted.text, self.config.max_text_chars);
        let prompt = extraction_prompt(&text);

        self.progress.on_stage(Stage::QueryingModel);
        let raw = self.model.invoke(&prompt, self.progress.as_ref()).await?;

        self.progress.on_stage(Stage::Normalizing);
        Ok(normalize_with(&raw, self.repair))
    }
}

/// Synchronous wrapper around [`Analyzer::analyze`].
///
/// Creates a temporary Tokio runtime; do not call from inside one.
pub fn analyze_sync(
    analyzer: &Analyzer,
    pdf: &[u8],
    file_name: &str,
    language: &str,
) -> Result<AnalysisResult, BeawareError> {
    Ok(tokio::runtime::Runtime::new()
        .map_err(|e| BeawareError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyzer.analyze(pdf, file_name, language)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecognitionError;
    use crate::output::Confidence;
    use crate::pipeline::llm::{InvocationOptions, TextGenerator};
    use futures::future::BoxFuture;
    use image::DynamicImage;
    use std::sync::Mutex;

    struct TextPages(String);

    impl PageSource for TextPages {
        fn page_texts(&self, _pdf: &[u8]) -> Result<Vec<Result<String, BeawareError>>, BeawareError> {
            Ok(vec![Ok(self.0.clone())])
        }

        fn rasterize(&self, _: &[u8], _: u32, _: u32) -> Result<Vec<DynamicImage>, BeawareError> {
            Ok(vec![DynamicImage::new_rgb8(2, 2)])
        }
    }

    struct NoOcr;

    impl Recognizer for NoOcr {
        fn recognize(&self, _: &DynamicImage, _: &str, page: usize) -> Result<String, RecognitionError> {
            Err(RecognitionError::Failed {
                page,
                detail: "engine missing".into(),
            })
        }
    }

    /// Records prompts and answers with a fixed reply.
    struct Scripted {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl TextGenerator for Scripted {
        fn generate<'a>(
            &'a self,
            prompt: &'a str,
            _options: &'a InvocationOptions,
        ) -> BoxFuture<'a, Result<String, String>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self.reply.clone();
            Box::pin(async move { reply })
        }
    }

    fn analyzer(text: &str, reply: Result<&str, &str>) -> (Analyzer, Arc<Scripted>) {
        let config = AnalyzerConfig::builder()
            .retry_backoff_ms(1)
            .max_retries(2)
            .build()
            .unwrap();
        let gen = Arc::new(Scripted {
            reply: reply.map(str::to_string).map_err(str::to_string),
            prompts: Mutex::new(Vec::new()),
        });
        let model = ModelClient::ready(gen.clone(), InvocationOptions::from_config(&config));
        let a = Analyzer::with_parts(config, Arc::new(TextPages(text.to_string())), Arc::new(NoOcr), model);
        (a, gen)
    }

    fn label_text() -> String {
        "Zutaten: Weizenmehl, Zucker, Butter (Milch), Haselnüsse. ".repeat(5)
    }

    #[tokio::test]
    async fn empty_bytes_short_circuit() {
        let (a, gen) = analyzer(&label_text(), Ok("{}"));
        let r = a.analyze(&[], "x.pdf", "de").await;
        assert_eq!(r.error.as_deref(), Some("Empty PDF bytes provided"));
        assert!(!r.metadata.ocr_used);
        assert_eq!(r.metadata.file_name.as_deref(), Some("x.pdf"));
        assert_eq!(r.metadata.language_selected.as_deref(), Some("de"));
        assert!(gen.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn success_is_stamped_with_provenance() {
        let (a, gen) = analyzer(
            &label_text(),
            Ok(r#"{"allergens":{"gluten":true,"milk":true,"tree_nuts":true},"nutritional_values":{"energy":"2000 kJ"},"metadata":{"ocr_used":true,"file_name":"model.pdf"}}"#),
        );
        let r = a.analyze(b"%PDF-1.7", "kekse.pdf", "hu").await;
        assert!(r.is_success());
        assert!(r.allergens.gluten && r.allergens.milk && r.allergens.tree_nuts);
        assert_eq!(r.nutritional_values.energy, "2000 kJ");
        // Provenance always overwrites model-supplied keys.
        assert!(!r.metadata.ocr_used);
        assert_eq!(r.metadata.file_name.as_deref(), Some("kekse.pdf"));
        assert_eq!(r.metadata.language_selected.as_deref(), Some("hu"));
        let expected_len = format!("--- Page 1 ---\n{}", label_text()).trim().chars().count();
        assert_eq!(r.metadata.extracted_text_length, Some(expected_len));
        assert_eq!(r.metadata.page_count, Some(1));

        let prompts = gen.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Haselnüsse"));
    }

    #[tokio::test]
    async fn model_failure_keeps_acquisition_provenance() {
        let (a, gen) = analyzer(&label_text(), Err("502 Bad Gateway"));
        let r = a.analyze(b"%PDF-1.7", "x.pdf", "en").await;
        let err = r.error.clone().unwrap();
        assert!(err.contains("2 attempt"), "got: {err}");
        assert!(err.contains("502"));
        assert_eq!(r.metadata.confidence, Confidence::Low);
        assert!(r.metadata.extracted_text_length.is_some());
        assert_eq!(gen.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn acquisition_failure_becomes_error_result() {
        let (a, gen) = analyzer("", Ok("{}"));
        let r = a.analyze(b"%PDF-1.7", "scan.pdf", "fr").await;
        let err = r.error.unwrap();
        assert!(err.starts_with("OCR processing failed"), "got: {err}");
        assert!(!r.metadata.ocr_used);
        assert_eq!(r.metadata.extracted_text_length, None);
        assert_eq!(r.metadata.page_count, None);
        assert!(gen.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_model_is_reported() {
        let config = AnalyzerConfig::default();
        let model = ModelClient::Unconfigured {
            provider: "openrouter".into(),
            hint: "Set OPENROUTER_API_KEY in environment.".into(),
        };
        let a = Analyzer::with_parts(config, Arc::new(TextPages(label_text())), Arc::new(NoOcr), model);
        let r = a.analyze(b"%PDF-1.7", "x.pdf", "en").await;
        assert!(r.error.unwrap().contains("OPENROUTER_API_KEY"));
    }

    #[tokio::test]
    async fn malformed_reply_carries_raw_response() {
        let (a, _) = analyzer(&label_text(), Ok("Sorry, I cannot help with that."));
        let r = a.analyze(b"%PDF-1.7", "x.pdf", "en").await;
        assert_eq!(r.error.as_deref(), Some("Failed to parse LLM response as JSON"));
        assert_eq!(r.raw_response.as_deref(), Some("Sorry, I cannot help with that."));
        assert_eq!(r.metadata.file_name.as_deref(), Some("x.pdf"));
    }

    #[test]
    fn sync_wrapper_runs_outside_runtime() {
        let (a, _) = analyzer(&label_text(), Ok("{}"));
        let r = analyze_sync(&a, b"%PDF-1.7", "x.pdf", "en").unwrap();
        assert!(r.is_success());
    }
}
