//! Upload page, upload endpoint and health check.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use sheetfeed_core::{InputError, SkippedRow, Stage, StageError};
use sheetfeed_upload::SheetsApi;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::pipeline::{Pipeline, PipelineReport};
use crate::upload_form;

const INDEX_HTML: &str = include_str!("../templates/index.html");
/// Room for multipart framing on top of the file size limit.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub struct AppState<S> {
    pub pipeline: Pipeline,
    pub sheets: S,
    /// One statement at a time, ingestion through upload.
    run_lock: Mutex<()>,
}

impl<S> AppState<S> {
    pub fn new(pipeline: Pipeline, sheets: S) -> Self {
        Self {
            pipeline,
            sheets,
            run_lock: Mutex::new(()),
        }
    }
}

/// JSON body returned by `POST /upload`.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub rows_appended: usize,
    pub warnings: Vec<String>,
    pub skipped: Vec<SkippedRow>,
}

impl Outcome {
    fn success(report: PipelineReport, tab: &str) -> Self {
        Self {
            ok: true,
            message: format!(
                "Upload complete: {} rows appended to the '{}' tab.",
                report.rows_appended, tab
            ),
            stage: None,
            error: None,
            rows_appended: report.rows_appended,
            warnings: report.warnings,
            skipped: report.skipped,
        }
    }

    fn failure(err: &StageError) -> Self {
        let rows_appended = match err {
            StageError::UploadRejected { rows_appended, .. } => *rows_appended,
            _ => 0,
        };
        Self {
            ok: false,
            message: err.user_message(),
            stage: Some(err.stage()),
            error: Some(err.kind()),
            rows_appended,
            warnings: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn bad_form(message: String) -> Self {
        Self {
            ok: false,
            message,
            stage: Some(Stage::Ingestion),
            error: Some("invalid_input"),
            rows_appended: 0,
            warnings: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

pub fn router<S: SheetsApi + 'static>(state: Arc<AppState<S>>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index::<S>))
        .route("/upload", post(upload::<S>))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES),
        ))
        .with_state(state)
}

async fn index<S: SheetsApi + 'static>(State(state): State<Arc<AppState<S>>>) -> Html<String> {
    let tab = escape_html(&state.pipeline.destination().tab);
    Html(INDEX_HTML.replace("{{ tab }}", &tab))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build": env!("SHEETFEED_BUILD_SHA"),
    }))
}

async fn upload<S: SheetsApi + 'static>(
    State(state): State<Arc<AppState<S>>>,
    multipart: Multipart,
) -> Response {
    let file = match upload_form::read_pdf_field(multipart).await {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(status = %e.status, message = %e.message, "upload form rejected");
            return (e.status, Json(Outcome::bad_form(e.message))).into_response();
        }
    };

    let _running = state.run_lock.lock().await;
    let tab = state.pipeline.destination().tab.clone();

    match state
        .pipeline
        .run(&state.sheets, file.file_name, file.data)
        .await
    {
        Ok(report) => {
            tracing::info!(
                file = %report.file_name,
                rows = report.rows_appended,
                skipped = report.skipped.len(),
                "statement processed"
            );
            (StatusCode::OK, Json(Outcome::success(report, &tab))).into_response()
        }
        Err(err) => {
            match &err {
                StageError::AuthenticationFailure { .. } | StageError::Internal { .. } => {
                    tracing::error!(stage = %err.stage(), kind = err.kind(), error = %err, "pipeline failed");
                }
                _ => tracing::warn!(stage = %err.stage(), kind = err.kind(), error = %err, "pipeline failed"),
            }
            (status_for(&err), Json(Outcome::failure(&err))).into_response()
        }
    }
}

fn status_for(err: &StageError) -> StatusCode {
    match err {
        StageError::InvalidInput(InputError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        StageError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        StageError::ExtractionEmpty { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StageError::AuthenticationFailure { .. } | StageError::UploadRejected { .. } => {
            StatusCode::BAD_GATEWAY
        }
        StageError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
