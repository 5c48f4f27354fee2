//! HTTP upload service.
//!
//! Routes:
//! - `POST /api/upload` (multipart field `hyperFile`)
//! - `POST /api/inspect/:file_id`
//! - `POST /api/export/:file_id` (JSON body `{sampleOnly, maxRows}`)
//! - `GET  /api/download/:file_id/:format` (`json` | `csv`, query `sampleOnly`, `maxRows`)
//! - `GET  /api/files`, `GET /api/health`
//!
//! Every failure is `{success: false, error}` with a status derived from the
//! error kind. An abandoned request drops its engine invocation, which
//! terminates the engine's process group.

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hyperlens_engine::validate::max_rows_from_json;
use hyperlens_engine::{CancellationToken, DispatchError, Dispatcher};
use hyperlens_protocol::defaults::UPLOAD_FIELD_NAME;
use hyperlens_protocol::{
    ApiResponse, ErrorKind, ErrorResponse, ExportOptions, ExportRequestBody, HealthResponse,
    HyperlensConfig, UploadResponse,
};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::shaping::{download_filename, ExportFormat};
use crate::staging::{original_name_of, StagingArea, StagingError, Sweeper};

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub staging: Arc<StagingArea>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, staging: StagingArea) -> Self {
        Self {
            dispatcher,
            staging: Arc::new(staging),
        }
    }
}

/// Error body plus status for every handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl From<StagingError> for ApiError {
    fn from(err: StagingError) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}", self.status.as_u16(), self.message);
        } else {
            warn!("{} {}", self.status.as_u16(), self.message);
        }
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::UnsupportedFileType | ErrorKind::Rejected => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::EngineFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::LaunchFailure | ErrorKind::MalformedResponse | ErrorKind::Io => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .staging
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/files", get(list_files))
        .route("/api/upload", post(upload))
        .route("/api/inspect/:file_id", post(inspect))
        .route("/api/export/:file_id", post(export))
        .route("/api/download/:file_id/:format", get(download))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the service until `shutdown` resolves, sweeping the staging
/// directory in the background.
pub async fn serve<F>(config: &HyperlensConfig, dispatcher: Dispatcher, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let staging = StagingArea::new(&config.staging);
    staging
        .ensure_dir()
        .context("Failed to prepare staging directory")?;
    let state = AppState::new(dispatcher, staging);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(
        "Hyperlens listening on http://{} (staging: {})",
        listener.local_addr()?,
        state.staging.dir().display()
    );

    let sweeper = Sweeper::start(state.staging.clone(), config.staging.sweep_interval());
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed");
    sweeper.stop().await;
    info!("Hyperlens server stopped");
    result
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let staged_files = state.staging.list().map(|f| f.len()).unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        staged_files,
    })
}

async fn list_files(State(state): State<AppState>) -> Result<Response, ApiError> {
    let files = state.staging.list()?;
    Ok(Json(ApiResponse::ok(files)).into_response())
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max = state.staging.max_upload_bytes();
    if let Some(length) = content_length(&headers) {
        if length > max.saturating_add(MULTIPART_OVERHEAD_BYTES) {
            return Err(StagingError::PayloadTooLarge { limit: max }.into());
        }
    }

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let mut pending = state.staging.begin(&file_name, None).await?;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            pending.write_chunk(&chunk).await?;
        }
        let file = pending.finish().await?;
        return Ok(Json(UploadResponse {
            success: true,
            file,
        }));
    }

    Err(ApiError::new(
        ErrorKind::InvalidInput,
        format!("No file uploaded (expected multipart field '{}')", UPLOAD_FIELD_NAME),
    ))
}

async fn inspect(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.staging.resolve(&file_id)?;
    let result = state
        .dispatcher
        .inspect(&path, &CancellationToken::new())
        .await?;
    Ok(Json(ApiResponse::ok(result)).into_response())
}

async fn export(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let path = state.staging.resolve(&file_id)?;
    let request: ExportRequestBody = if body.iter().all(u8::is_ascii_whitespace) {
        ExportRequestBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::new(ErrorKind::InvalidInput, format!("Invalid request body: {}", e))
        })?
    };
    let options = export_options(request.sample_only, request.max_rows)?;

    let result = state
        .dispatcher
        .export(&path, &options, &CancellationToken::new())
        .await?;
    Ok(Json(ApiResponse::ok(result)).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadQuery {
    sample_only: Option<String>,
    max_rows: Option<String>,
}

async fn download(
    State(state): State<AppState>,
    Path((file_id, format)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let format = format
        .parse::<ExportFormat>()
        .map_err(|e| ApiError::new(ErrorKind::InvalidInput, e))?;
    let path = state.staging.resolve(&file_id)?;

    let sample_only = match query.sample_only.as_deref() {
        None => false,
        Some(flag) => parse_flag(flag).ok_or_else(|| {
            ApiError::new(
                ErrorKind::InvalidInput,
                format!("sampleOnly must be true or false, got '{}'", flag),
            )
        })?,
    };
    let options = export_options(sample_only, query.max_rows.map(Value::String))?;

    let result = state
        .dispatcher
        .export(&path, &options, &CancellationToken::new())
        .await?;
    let body = format
        .render(&result)
        .map_err(|e| ApiError::new(ErrorKind::Io, format!("Failed to render export: {}", e)))?;

    let filename = download_filename(original_name_of(&file_id), format);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| ApiError::new(ErrorKind::Io, e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// A sample export ignores `maxRows` entirely, as the CLI's `--sample` does.
fn export_options(sample_only: bool, max_rows: Option<Value>) -> Result<ExportOptions, ApiError> {
    if sample_only {
        return Ok(ExportOptions::sample());
    }
    Ok(ExportOptions {
        sample_only: false,
        max_rows: max_rows_from_json(max_rows.as_ref().unwrap_or(&Value::Null))?,
    })
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    let kind = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorKind::PayloadTooLarge
    } else {
        ErrorKind::InvalidInput
    };
    ApiError::new(kind, format!("Upload failed: {}", err.body_text()))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
