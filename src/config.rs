//! Configuration for label analysis.
//!
//! All pipeline behaviour is controlled through [`AnalyzerConfig`]. It is
//! built once at startup, either through [`AnalyzerConfig::builder()`] or
//! from the process environment with [`AnalyzerConfig::from_env()`], and is
//! then shared read-only (behind an `Arc`) by every request.

use crate::error::BeawareError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Every language the OCR engine is asked to read. Labels are routinely
/// printed in several EU languages at once, so the full set is used no
/// matter which language the user selected.
pub const DEFAULT_OCR_LANGUAGES: &str =
    "eng+deu+fra+spa+ita+por+hun+pol+ces+slk+ron+bul+hrv+slv+est+lav+lit";

/// Default model served through OpenRouter.
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat-v3.1";

/// Default provider name passed to `edgequake_llm::ProviderFactory`.
pub const DEFAULT_PROVIDER: &str = "openrouter";

/// Configuration for label analysis, the model client and the HTTP service.
///
/// # Example
/// ```rust
/// use beaware::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .dpi(200)
///     .max_retries(2)
///     .model("openai/gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 2);
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    // ── HTTP service ──────────────────────────────────────────────────────
    /// Origins allowed by CORS. `["*"]` allows any origin. Default: `["*"]`.
    pub allowed_origins: Vec<String>,

    /// Largest accepted upload in bytes. Default: 15 MiB.
    pub max_upload_bytes: usize,

    /// Address the HTTP service binds to. Default: `127.0.0.1:8000`.
    pub bind_addr: String,

    // ── Text acquisition ──────────────────────────────────────────────────
    /// Structural text shorter than this many characters triggers OCR. Default: 100.
    ///
    /// A bare emptiness check is not enough: a watermark or a one-line footer
    /// in an otherwise scanned label would short-circuit OCR.
    pub min_text_length: usize,

    /// Rasterisation DPI for the OCR fallback. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Longest rendered edge in pixels, regardless of DPI. Default: 5000.
    pub max_rendered_pixels: u32,

    /// Image format written for the OCR engine. Default: PNG.
    pub raster_format: RasterFormat,

    /// Path to the pdfium shared library. `None` searches the usual places.
    pub pdfium_lib_path: Option<PathBuf>,

    // ── OCR engine ────────────────────────────────────────────────────────
    /// Tesseract executable. Default: `tesseract` (on `PATH`).
    pub tesseract_cmd: PathBuf,

    /// `+`-joined tesseract language codes. Default: [`DEFAULT_OCR_LANGUAGES`].
    pub ocr_languages: String,

    /// Tesseract page segmentation mode (`--psm`). Default: 3.
    pub tesseract_psm: u8,

    /// Tesseract engine mode (`--oem`). Default: 3.
    pub tesseract_oem: u8,

    // ── Prompting ─────────────────────────────────────────────────────────
    /// Character budget for the label text embedded in the prompt. Default: 6000.
    pub max_text_chars: usize,

    // ── Model ─────────────────────────────────────────────────────────────
    /// Provider name for `ProviderFactory`. Default: `openrouter`.
    pub provider_name: String,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Output token cap. Default: 2000.
    pub max_tokens: usize,

    /// Per-call timeout in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Total attempts per model call (not retries after the first). Default: 3.
    pub max_retries: u32,

    /// Backoff unit in milliseconds; attempt `k` waits `unit * 2^(k-1)`. Default: 1000.
    pub retry_backoff_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            max_upload_bytes: 15 * 1024 * 1024,
            bind_addr: "127.0.0.1:8000".to_string(),
            min_text_length: 100,
            dpi: 300,
            max_rendered_pixels: 5000,
            raster_format: RasterFormat::default(),
            pdfium_lib_path: None,
            tesseract_cmd: PathBuf::from("tesseract"),
            ocr_languages: DEFAULT_OCR_LANGUAGES.to_string(),
            tesseract_psm: 3,
            tesseract_oem: 3,
            max_text_chars: 6000,
            provider_name: DEFAULT_PROVIDER.to_string(),
            provider: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            api_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("allowed_origins", &self.allowed_origins)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("bind_addr", &self.bind_addr)
            .field("min_text_length", &self.min_text_length)
            .field("dpi", &self.dpi)
            .field("raster_format", &self.raster_format)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("ocr_languages", &self.ocr_languages)
            .field("max_text_chars", &self.max_text_chars)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from the process environment.
    ///
    /// Unset variables keep their defaults; set-but-unparseable variables are
    /// an error rather than being silently ignored.
    pub fn from_env() -> Result<Self, BeawareError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BeawareError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut b = Self::builder();

        if let Some(v) = get("CORS_ORIGINS") {
            b = b.allowed_origins(v.split(',').map(|s| s.trim().to_string()).collect());
        }
        if let Some(v) = get("MAX_UPLOAD_SIZE_BYTES") {
            b = b.max_upload_bytes(parse_var("MAX_UPLOAD_SIZE_BYTES", &v)?);
        }
        if let Some(v) = get("BEAWARE_BIND") {
            b = b.bind_addr(v);
        }
        if let Some(v) = get("MIN_TEXT_LENGTH") {
            b = b.min_text_length(parse_var("MIN_TEXT_LENGTH", &v)?);
        }
        if let Some(v) = get("PDF_DPI") {
            b = b.dpi(parse_var("PDF_DPI", &v)?);
        }
        if let Some(v) = get("PDF_FORMAT") {
            b = b.raster_format(parse_var("PDF_FORMAT", &v)?);
        }
        if let Some(v) = get("PDFIUM_LIB_PATH") {
            b = b.pdfium_lib_path(v);
        }
        if let Some(v) = get("TESSERACT_CMD") {
            b = b.tesseract_cmd(v);
        }
        if let Some(v) = get("OCR_LANGUAGES") {
            b = b.ocr_languages(v);
        }
        if let Some(v) = get("TESSERACT_PSM") {
            b = b.tesseract_psm(parse_var("TESSERACT_PSM", &v)?);
        }
        if let Some(v) = get("TESSERACT_OEM") {
            b = b.tesseract_oem(parse_var("TESSERACT_OEM", &v)?);
        }
        if let Some(v) = get("MAX_TEXT_CHARS") {
            b = b.max_text_chars(parse_var("MAX_TEXT_CHARS", &v)?);
        }
        if let Some(v) = get("LLM_PROVIDER") {
            b = b.provider_name(v);
        }
        if let Some(v) = get("LLM_MODEL") {
            b = b.model(v);
        }
        if let Some(v) = get("LLM_TEMPERATURE") {
            b = b.temperature(parse_var("LLM_TEMPERATURE", &v)?);
        }
        if let Some(v) = get("LLM_MAX_TOKENS") {
            b = b.max_tokens(parse_var("LLM_MAX_TOKENS", &v)?);
        }
        if let Some(v) = get("LLM_TIMEOUT") {
            b = b.api_timeout_secs(parse_var("LLM_TIMEOUT", &v)?);
        }
        if let Some(v) = get("LLM_MAX_RETRIES") {
            b = b.max_retries(parse_var("LLM_MAX_RETRIES", &v)?);
        }
        if let Some(v) = get("LLM_RETRY_BACKOFF_MS") {
            b = b.retry_backoff_ms(parse_var("LLM_RETRY_BACKOFF_MS", &v)?);
        }

        b.build()
    }

    /// True when CORS should allow every origin.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, BeawareError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| BeawareError::InvalidConfig(format!("{key}={value:?}: {e}")))
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.config.allowed_origins = origins;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn min_text_length(mut self, n: usize) -> Self {
        self.config.min_text_length = n;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn raster_format(mut self, format: RasterFormat) -> Self {
        self.config.raster_format = format;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn ocr_languages(mut self, langs: impl Into<String>) -> Self {
        self.config.ocr_languages = langs.into();
        self
    }

    pub fn tesseract_psm(mut self, psm: u8) -> Self {
        self.config.tesseract_psm = psm;
        self
    }

    pub fn tesseract_oem(mut self, oem: u8) -> Self {
        self.config.tesseract_oem = oem;
        self
    }

    pub fn max_text_chars(mut self, n: usize) -> Self {
        self.config.max_text_chars = n;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, BeawareError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(BeawareError::InvalidConfig(
                "LLM_MAX_RETRIES must be ≥ 1 (it counts total attempts)".into(),
            ));
        }
        if c.max_text_chars < 2 {
            return Err(BeawareError::InvalidConfig(format!(
                "MAX_TEXT_CHARS must be ≥ 2, got {}",
                c.max_text_chars
            )));
        }
        if c.ocr_languages.trim().is_empty() {
            return Err(BeawareError::InvalidConfig(
                "OCR_LANGUAGES must name at least one language".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(BeawareError::InvalidConfig("LLM_MODEL must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Image format used when handing rasterised pages to the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    /// Lossless; best OCR accuracy. (default)
    #[default]
    Png,
    /// Smaller temp files on very large scans.
    Jpeg,
}

impl RasterFormat {
    /// File extension used for temp images.
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            RasterFormat::Png => image::ImageFormat::Png,
            RasterFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl FromStr for RasterFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(RasterFormat::Png),
            "jpg" | "jpeg" => Ok(RasterFormat::Jpeg),
            other => Err(format!("unsupported raster format '{other}' (png, jpeg)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.max_upload_bytes, 15 * 1024 * 1024);
        assert_eq!(c.min_text_length, 100);
        assert_eq!(c.max_text_chars, 6000);
        assert_eq!(c.dpi, 300);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.max_tokens, 2000);
        assert_eq!(c.api_timeout_secs, 30);
        assert_eq!(c.model, DEFAULT_MODEL);
        assert!(c.allows_any_origin());
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let c = AnalyzerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(c.ocr_languages, DEFAULT_OCR_LANGUAGES);
        assert_eq!(c.provider_name, DEFAULT_PROVIDER);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let c = AnalyzerConfig::from_lookup(lookup(&[
            ("CORS_ORIGINS", "http://localhost:5173, https://beaware.example"),
            ("MAX_UPLOAD_SIZE_BYTES", "1048576"),
            ("OCR_LANGUAGES", "eng+hun"),
            ("PDF_FORMAT", "JPEG"),
            ("LLM_MAX_RETRIES", "5"),
            ("LLM_TEMPERATURE", "0.0"),
            ("MAX_TEXT_CHARS", "4000"),
        ]))
        .unwrap();
        assert_eq!(
            c.allowed_origins,
            vec!["http://localhost:5173", "https://beaware.example"]
        );
        assert!(!c.allows_any_origin());
        assert_eq!(c.max_upload_bytes, 1_048_576);
        assert_eq!(c.ocr_languages, "eng+hun");
        assert_eq!(c.raster_format, RasterFormat::Jpeg);
        assert_eq!(c.max_retries, 5);
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_text_chars, 4000);
    }

    #[test]
    fn unparseable_variable_is_an_error() {
        let err = AnalyzerConfig::from_lookup(lookup(&[("PDF_DPI", "high")])).unwrap_err();
        assert!(err.to_string().contains("PDF_DPI"), "got: {err}");
    }

    #[test]
    fn blank_variable_is_treated_as_unset() {
        let c = AnalyzerConfig::from_lookup(lookup(&[("LLM_MODEL", "   ")])).unwrap();
        assert_eq!(c.model, DEFAULT_MODEL);
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(AnalyzerConfig::builder().max_retries(0).build().is_err());
    }

    #[test]
    fn dpi_is_clamped() {
        let c = AnalyzerConfig::builder().dpi(5000).build().unwrap();
        assert_eq!(c.dpi, 600);
        let c = AnalyzerConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
    }

    #[test]
    fn raster_format_parsing() {
        assert_eq!("png".parse::<RasterFormat>().unwrap(), RasterFormat::Png);
        assert_eq!("jpg".parse::<RasterFormat>().unwrap(), RasterFormat::Jpeg);
        assert!("tiff".parse::<RasterFormat>().is_err());
        assert_eq!(RasterFormat::Jpeg.extension(), "jpg");
    }
}
