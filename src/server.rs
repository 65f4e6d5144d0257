//! HTTP surface: a thin axum router over [`InvoiceExtractor`].
//!
//! | Route              | Response                                              |
//! |--------------------|-------------------------------------------------------|
//! | `GET /`            | `{"message": "PDF Data Extractor API is running"}`    |
//! | `GET /health`      | `{"status": "healthy", "api_key_configured": bool}`   |
//! | `POST /api/extract`| multipart field `file` → [`ExtractResponse`] or error |
//!
//! Errors are rendered as `{"detail": message}` with the status from
//! [`Pdf2TableError::status_code`].

use crate::error::Pdf2TableError;
use crate::extract::{validate_filename, InvoiceExtractor, UploadedDocument};
use crate::output::ExtractResponse;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::any::Any as PanicPayload;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

/// Headroom over `max_upload_bytes` for multipart boundaries and headers.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

// ── State ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    extractor: Arc<InvoiceExtractor>,
}

// ── Error type ───────────────────────────────────────────────────────────────

struct AppError(Pdf2TableError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({"detail": self.0.to_string()}))).into_response()
    }
}

impl From<Pdf2TableError> for AppError {
    fn from(e: Pdf2TableError) -> Self {
        AppError(e)
    }
}

/// Turn a handler panic into a `500 {"detail": ...}` response.
fn panic_response(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Internal server error".to_string()
    };
    AppError(Pdf2TableError::Internal(detail)).into_response()
}

fn malformed(e: MultipartError) -> Pdf2TableError {
    Pdf2TableError::MalformedUpload {
        status: e.status(),
        detail: e.body_text(),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler() -> Json<Value> {
    Json(json!({"message": "PDF Data Extractor API is running"}))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "api_key_configured": state.extractor.api_key_configured(),
    }))
}

async fn extract_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractResponse>, AppError> {
    let mut multipart = multipart.map_err(|rejection| Pdf2TableError::MalformedUpload {
        status: rejection.status(),
        detail: rejection.body_text(),
    })?;

    let upload = read_upload(&mut multipart).await?;
    let response = state.extractor.extract_upload(upload).await?;
    Ok(Json(response))
}

/// Take the `file` field, or failing that the first field carrying a
/// filename. The suffix is checked before the body is read.
async fn read_upload(multipart: &mut Multipart) -> Result<UploadedDocument, Pdf2TableError> {
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        validate_filename(&filename)?;

        let bytes = field.bytes().await.map_err(malformed)?;
        return Ok(UploadedDocument::new(filename, bytes.to_vec()));
    }
    Err(Pdf2TableError::MissingUpload)
}

// ── Router ───────────────────────────────────────────────────────────────────

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Build the application router around a shared extractor.
pub fn router(extractor: Arc<InvoiceExtractor>) -> Router {
    let config = extractor.config();
    let body_limit = config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let cors = cors_layer(&config.cors_origins);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/extract", post(extract_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(AppState { extractor })
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
