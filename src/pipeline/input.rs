//! Input resolution: read a user-supplied path or URL into memory.
//!
//! Everything downstream works on byte slices (pdfium can open a PDF from
//! memory, uploads arrive as bytes), so a URL is downloaded straight into a
//! buffer. The `%PDF` magic is checked here so callers get a clear error
//! instead of a pdfium parse failure.

use crate::error::BeawareError;
use std::path::PathBuf;
use tracing::{debug, info};

/// A PDF read into memory, with the name it should be reported under.
#[derive(Debug, Clone)]
pub struct LoadedPdf {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// True when `bytes` start with the PDF magic number.
pub fn has_pdf_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Load a local path or an HTTP(S) URL.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedPdf, BeawareError> {
    let loaded = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };

    if !loaded.bytes.is_empty() && !has_pdf_magic(&loaded.bytes) {
        return Err(BeawareError::NotAPdf {
            name: loaded.file_name,
            magic: loaded.bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(loaded)
}

async fn read_local(path_str: &str) -> Result<LoadedPdf, BeawareError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => BeawareError::PermissionDenied { path: path.clone() },
        _ => BeawareError::FileNotFound { path: path.clone() },
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedPdf { bytes, file_name })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedPdf, BeawareError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| BeawareError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            BeawareError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let file_name = file_name_from_url(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| failed(e.to_string()))?
        .to_vec();

    info!("Downloaded {} bytes as {}", bytes.len(), file_name);
    Ok(LoadedPdf { bytes, file_name })
}

/// Last path segment of `url` when it looks like a file name.
pub fn file_name_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/label.pdf"));
        assert!(is_url("http://example.com/label.pdf"));
        assert!(!is_url("/tmp/label.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn url_file_names() {
        assert_eq!(file_name_from_url("https://x.test/labels/kekse.pdf"), "kekse.pdf");
        assert_eq!(file_name_from_url("https://x.test/labels/"), "downloaded.pdf");
        assert_eq!(file_name_from_url("not a url"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn local_pdf_is_read() {
        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"%PDF-1.7\n%%EOF").unwrap();
        let loaded = load_input(f.path().to_str().unwrap(), 5).await.unwrap();
        assert!(loaded.file_name.ends_with(".pdf"));
        assert!(has_pdf_magic(&loaded.bytes));
    }

    #[tokio::test]
    async fn non_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04zip").unwrap();
        let err = load_input(f.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, BeawareError::NotAPdf { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_input("/nonexistent/label.pdf", 5).await.unwrap_err();
        assert!(matches!(err, BeawareError::FileNotFound { .. }));
    }
}
