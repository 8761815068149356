//! Request handlers.
//!
//! Endpoints:
//! - GET  /                    - Service info and endpoint list
//! - GET  /health              - Model and OCR readiness
//! - GET  /supported-languages - Installed OCR languages
//! - POST /upload              - Analyse an uploaded label PDF
//! - POST /generate-pdf        - Render a report PDF from analysis data

use super::error::ApiError;
use super::AppState;
use crate::error::BeawareError;
use crate::output::AnalysisResult;
use crate::pipeline::ocr::{self, OcrProbe};
use crate::report::{self, REPORT_FILE_NAME};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, error, info, warn};

// ============================================================================
// Info & health
// ============================================================================

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "BE AWARE - Multi-Language Food Info Extractor",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health - Health check",
            "upload": "/upload (POST) - Upload and analyze PDF",
            "generate_pdf": "/generate-pdf (POST) - Generate report PDF",
            "supported_languages": "/supported-languages - OCR language info"
        }
    }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: String,
    services: HealthServices,
}

#[derive(Serialize)]
struct HealthServices {
    llm: LlmHealth,
    ocr: OcrHealth,
}

#[derive(Serialize)]
struct LlmHealth {
    configured: bool,
    model: Option<String>,
}

#[derive(Serialize)]
struct OcrHealth {
    available: bool,
    languages_count: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let probe = run_probe(&state).await;
    let model = state.analyzer.model();
    let configured = model.is_ready();

    Json(HealthResponse {
        status: if configured { "healthy" } else { "degraded" },
        timestamp: chrono::Utc::now().to_rfc3339(),
        services: HealthServices {
            llm: LlmHealth {
                configured,
                model: model.defaults().map(|d| d.model.clone()),
            },
            ocr: OcrHealth {
                available: probe.success,
                languages_count: probe.available_languages.len(),
            },
        },
    })
}

#[derive(Serialize)]
pub struct LanguagesResponse {
    success: bool,
    tesseract_installed_languages: Vec<String>,
    configured_string: String,
    tesseract_path: String,
}

pub async fn supported_languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    let probe = run_probe(&state).await;
    Json(LanguagesResponse {
        success: probe.success,
        tesseract_installed_languages: probe.available_languages,
        configured_string: probe.configured_languages,
        tesseract_path: probe.tesseract_path,
    })
}

/// The probe spawns processes, so it runs on the blocking pool.
async fn run_probe(state: &AppState) -> OcrProbe {
    let config = state.analyzer.config().clone();
    let fallback = OcrProbe {
        success: false,
        tesseract_path: config.tesseract_cmd.display().to_string(),
        configured_languages: config.ocr_languages.clone(),
        version: None,
        available_languages: Vec::new(),
        error: Some("OCR probe task failed".to_string()),
    };
    tokio::task::spawn_blocking(move || ocr::probe(&config))
        .await
        .unwrap_or(fallback)
}

// ============================================================================
// Upload
// ============================================================================

#[derive(Serialize)]
pub struct UploadResponse {
    success: bool,
    filename: String,
    file_size_bytes: usize,
    processing_time_seconds: f64,
    data: AnalysisResult,
}

/// POST /upload
///
/// Multipart fields: `file` (the PDF) and optional `language` (default `en`).
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_bytes = state.analyzer.config().max_upload_bytes;
    let read_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::too_large(max_bytes)
        } else {
            warn!("Failed to read multipart field: {}", e);
            ApiError::UploadRead
        }
    };

    let mut file = None;
    let mut language = String::from("en");

    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        let name = field.name().unwrap_or("").to_string();
        debug!("Received field: name='{}', filename={:?}", name, field.file_name());

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("uploaded.pdf").to_string();
                if !filename.to_lowercase().ends_with(".pdf") {
                    return Err(ApiError::InvalidFileType);
                }
                let data = field.bytes().await.map_err(read_error)?;
                file = Some((filename, data));
            }
            "language" => {
                let value = field.text().await.map_err(read_error)?;
                if !value.trim().is_empty() {
                    language = value.trim().to_string();
                }
            }
            _ => {}
        }
    }

    let Some((filename, contents)) = file else {
        return Err(ApiError::MissingFile);
    };
    if contents.len() > max_bytes {
        return Err(ApiError::too_large(max_bytes));
    }

    let start = Instant::now();
    let result = state.analyzer.analyze(&contents, &filename, &language).await;
    let duration = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;

    info!(
        "Upload '{}' ({} bytes) analysed in {}s, success={}",
        filename,
        contents.len(),
        duration,
        result.is_success()
    );

    Ok(Json(UploadResponse {
        success: result.is_success(),
        filename,
        file_size_bytes: contents.len(),
        processing_time_seconds: duration,
        data: result,
    }))
}

// ============================================================================
// Report
// ============================================================================

/// POST /generate-pdf
pub async fn generate_pdf(Json(payload): Json<Value>) -> Result<Response, ApiError> {
    let bytes = report::render_payload(&payload).map_err(|e| {
        error!("PDF generation failed: {}", e);
        match e {
            BeawareError::ReportFailed(detail) => ApiError::Report(detail),
            other => ApiError::Report(other.to_string()),
        }
    })?;

    let disposition = format!("attachment; filename=\"{}\"", REPORT_FILE_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
