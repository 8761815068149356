//! OCR via the Tesseract command-line engine.
//!
//! Pages are handed over as temp image files (PNG by default) and the
//! recognised text is read back from stdout:
//!
//! ```text
//! tesseract <page.png> stdout -l eng+deu+… --psm 3 --oem 3
//! ```
//!
//! The [`probe`] function is the stateless "is OCR usable here?" check
//! behind `GET /supported-languages` and `beaware probe`.

use crate::config::{AnalyzerConfig, RasterFormat};
use crate::error::RecognitionError;
use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tempfile::TempDir;
use tracing::debug;

/// Turns one page image into text.
pub trait Recognizer: Send + Sync {
    /// Recognise `image` (1-indexed `page`) using `+`-joined `languages`.
    fn recognize(
        &self,
        image: &DynamicImage,
        languages: &str,
        page: usize,
    ) -> Result<String, RecognitionError>;
}

/// [`Recognizer`] that shells out to the `tesseract` binary.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    cmd: PathBuf,
    psm: u8,
    oem: u8,
    format: RasterFormat,
}

impl TesseractCli {
    pub fn new(cmd: impl Into<PathBuf>, psm: u8, oem: u8, format: RasterFormat) -> Self {
        Self {
            cmd: cmd.into(),
            psm,
            oem,
            format,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(
            config.tesseract_cmd.clone(),
            config.tesseract_psm,
            config.tesseract_oem,
            config.raster_format,
        )
    }

    /// The argument list after the image path.
    fn args(&self, languages: &str) -> Vec<String> {
        vec![
            "stdout".to_string(),
            "-l".to_string(),
            languages.to_string(),
            "--psm".to_string(),
            self.psm.to_string(),
            "--oem".to_string(),
            self.oem.to_string(),
        ]
    }

    fn write_image(&self, image: &DynamicImage, dir: &Path) -> Result<PathBuf, RecognitionError> {
        let path = dir.join(format!("page.{}", self.format.extension()));
        let result = match self.format {
            // JPEG has no alpha channel.
            RasterFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
                .save_with_format(&path, self.format.image_format()),
            RasterFormat::Png => image.save_with_format(&path, self.format.image_format()),
        };
        result.map_err(|e| RecognitionError::Image(e.to_string()))?;
        Ok(path)
    }
}

impl Recognizer for TesseractCli {
    fn recognize(
        &self,
        image: &DynamicImage,
        languages: &str,
        page: usize,
    ) -> Result<String, RecognitionError> {
        let start = Instant::now();
        let temp_dir = TempDir::new()?;
        let image_path = self.write_image(image, temp_dir.path())?;

        let output = Command::new(&self.cmd)
            .arg(&image_path)
            .args(self.args(languages))
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let text = String::from_utf8_lossy(&output.stdout).to_string();
                debug!(
                    "OCR page {}: {} chars in {:?}",
                    page,
                    text.chars().count(),
                    start.elapsed()
                );
                Ok(text)
            }
            Ok(output) => Err(RecognitionError::Failed {
                page,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RecognitionError::EngineNotAvailable(format!(
                    "'{}' not found (install tesseract-ocr or set TESSERACT_CMD)",
                    self.cmd.display()
                )))
            }
            Err(e) => Err(RecognitionError::Io(e)),
        }
    }
}

// ── Probe ────────────────────────────────────────────────────────────────

/// What the OCR engine on this machine can do.
#[derive(Debug, Clone, Serialize)]
pub struct OcrProbe {
    pub success: bool,
    pub tesseract_path: String,
    pub configured_languages: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub available_languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run `tesseract --version` and `tesseract --list-langs`.
pub fn probe(config: &AnalyzerConfig) -> OcrProbe {
    let cmd = &config.tesseract_cmd;
    let mut report = OcrProbe {
        success: false,
        tesseract_path: cmd.display().to_string(),
        configured_languages: config.ocr_languages.clone(),
        version: None,
        available_languages: Vec::new(),
        error: None,
    };

    match Command::new(cmd).arg("--version").output() {
        Ok(out) => {
            // Older builds print the banner on stderr.
            let text = if out.stdout.is_empty() { out.stderr } else { out.stdout };
            report.version = parse_version(&String::from_utf8_lossy(&text));
        }
        Err(e) => {
            report.error = Some(format!("failed to run {}: {}", cmd.display(), e));
            return report;
        }
    }

    match Command::new(cmd).arg("--list-langs").output() {
        Ok(out) if out.status.success() => {
            let mut text = String::from_utf8_lossy(&out.stdout).to_string();
            if text.trim().is_empty() {
                text = String::from_utf8_lossy(&out.stderr).to_string();
            }
            report.available_languages = parse_list_langs(&text);
            report.success = true;
        }
        Ok(out) => {
            report.error = Some(String::from_utf8_lossy(&out.stderr).trim().to_string());
        }
        Err(e) => report.error = Some(e.to_string()),
    }
    report
}

/// First line of `tesseract --version`, e.g. `tesseract 5.3.4`.
pub fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Language codes from `tesseract --list-langs`, skipping the header line.
pub fn parse_list_langs(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_config() {
        let t = TesseractCli::new("tesseract", 6, 1, RasterFormat::Png);
        assert_eq!(
            t.args("eng+hun"),
            vec!["stdout", "-l", "eng+hun", "--psm", "6", "--oem", "1"]
        );
    }

    #[test]
    fn list_langs_skips_header() {
        let out = "List of available languages in \"/usr/share/tesseract-ocr/5/tessdata/\" (3):\neng\nhun\nosd\n";
        assert_eq!(parse_list_langs(out), vec!["eng", "hun", "osd"]);
    }

    #[test]
    fn version_is_first_line() {
        let out = "tesseract 5.3.4\n leptonica-1.82.0\n";
        assert_eq!(parse_version(out).as_deref(), Some("tesseract 5.3.4"));
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn missing_engine_is_reported() {
        let t = TesseractCli::new("/nonexistent/tesseract", 3, 3, RasterFormat::Png);
        let img = DynamicImage::new_rgb8(8, 8);
        let err = t.recognize(&img, "eng", 1).unwrap_err();
        assert!(matches!(err, RecognitionError::EngineNotAvailable(_)), "got: {err}");
    }

    #[test]
    fn jpeg_pages_are_written_without_alpha() {
        let t = TesseractCli::new("tesseract", 3, 3, RasterFormat::Jpeg);
        let dir = TempDir::new().unwrap();
        let img = DynamicImage::new_rgba8(4, 4);
        let path = t.write_image(&img, dir.path()).unwrap();
        assert!(path.ends_with("page.jpg"));
        assert!(path.exists());
    }

    #[test]
    fn probe_without_engine_fails_softly() {
        let config = AnalyzerConfig::builder()
            .tesseract_cmd("/nonexistent/tesseract")
            .build()
            .unwrap();
        let p = probe(&config);
        assert!(!p.success);
        assert!(p.error.is_some());
        assert!(p.available_languages.is_empty());
    }
}
