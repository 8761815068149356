//! HTTP service (feature `server`).
//!
//! A thin axum layer over [`Analyzer`] and [`crate::report`]. Configuration
//! is read once at startup and shared read-only by every request.

mod error;
mod routes;

pub use error::ApiError;

use crate::analyze::Analyzer;
use crate::config::AnalyzerConfig;
use crate::error::BeawareError;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Analyzer,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = state.analyzer.config();
    let body_limit = config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    let cors = cors_layer(config);

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/supported-languages", get(routes::supported_languages))
        .route("/upload", post(routes::upload))
        .route("/generate-pdf", post(routes::generate_pdf))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &AnalyzerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {:?}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Bind `config.bind_addr` and serve until Ctrl+C / SIGTERM.
pub async fn serve(analyzer: Analyzer) -> Result<(), BeawareError> {
    let addr = analyzer.config().bind_addr.clone();
    let app = router(AppState::new(analyzer));

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| BeawareError::Internal(format!("failed to bind {addr}: {e}")))?;
    info!("BE AWARE backend listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BeawareError::Internal(format!("server error: {e}")))?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::PdfiumPages;
    use crate::pipeline::llm::ModelClient;
    use crate::pipeline::ocr::TesseractCli;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "beawareboundary";

    fn app(max_upload_bytes: usize) -> Router {
        let config = AnalyzerConfig::builder()
            .max_upload_bytes(max_upload_bytes)
            .tesseract_cmd("/nonexistent/tesseract")
            .build()
            .unwrap();
        let recognizer = Arc::new(TesseractCli::from_config(&config));
        let model = ModelClient::Unconfigured {
            provider: "openrouter".into(),
            hint: "Set OPENROUTER_API_KEY in environment.".into(),
        };
        let analyzer =
            Analyzer::with_parts(config, Arc::new(PdfiumPages::default()), recognizer, model);
        router(AppState::new(analyzer))
    }

    fn multipart(filename: &str, contents: &[u8], language: Option<&str>) -> Request<Body> {
        let mut body = Vec::new();
        if let Some(lang) = language {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\n{lang}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let resp = app(1024)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert!(body["endpoints"]["upload"].is_string());
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected() {
        let resp = app(1024)
            .oneshot(multipart("notes.txt", b"hello", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(
            body["detail"],
            "Invalid file type. Only PDF files are supported."
        );
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let resp = app(16)
            .oneshot(multipart("big.pdf", &[b'x'; 64], None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn empty_pdf_is_analysed_to_an_error_result() {
        let resp = app(1024)
            .oneshot(multipart("x.PDF", b"", Some("hu")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["filename"], "x.PDF");
        assert_eq!(body["file_size_bytes"], 0);
        assert_eq!(body["data"]["error"], "Empty PDF bytes provided");
        assert_eq!(body["data"]["metadata"]["language_selected"], "hu");
        assert_eq!(body["data"]["allergens"]["milk"], false);
        assert_eq!(body["data"]["nutritional_values"]["energy"], "Not available");
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"language\"\r\n\r\nen\r\n--{BOUNDARY}--\r\n"
        );
        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let resp = app(1024).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_pdf_returns_attachment() {
        let payload = serde_json::json!({
            "language": "fr",
            "data": {
                "allergens": {"milk": true},
                "nutritional_values": {"energy": "250 kcal"}
            }
        });
        let req = Request::builder()
            .method("POST")
            .uri("/generate-pdf")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let resp = app(1024).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"be_aware_report.pdf\""
        );
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn health_is_degraded_without_model() {
        let resp = app(1024)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["services"]["llm"]["configured"], false);
        assert_eq!(body["services"]["ocr"]["available"], false);
    }

    #[tokio::test]
    async fn supported_languages_reports_missing_tesseract() {
        let resp = app(1024)
            .oneshot(
                Request::get("/supported-languages")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["tesseract_path"], "/nonexistent/tesseract");
    }
}
