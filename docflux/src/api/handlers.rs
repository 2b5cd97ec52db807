//! HTTP handlers. Extraction is CPU- and subprocess-bound, so every
//! conversion runs on tokio's blocking pool inside a span tagged with a
//! fresh request id.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use tracing::{debug, info_span, Span};
use uuid::Uuid;

use crate::api::dto::{
    cell_to_string, ExtractPdfResponse, HealthResponse, TablesToCsvRequest, TablesToCsvResponse,
};
use crate::api::AppState;
use crate::error::{DocfluxError, Result};
use crate::models::{ExtractionOptions, ExtractionRequest, ExtractionResult};
use crate::processing::extractors::rows_to_csv;

/// Multipart field carrying the document.
const FILE_FIELD: &str = "file";

fn rejection(status: StatusCode, message: String) -> DocfluxError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        DocfluxError::PayloadTooLarge(message)
    } else {
        DocfluxError::Validation(message)
    }
}

async fn run_blocking<T, F>(span: Span, task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || span.in_scope(task))
        .await
        .map_err(|e| DocfluxError::Internal(format!("Extraction task failed: {e}")))?
}

/// Document bytes and their content type. Multipart bodies contribute the
/// `file` part and its own content type; anything else is taken raw with
/// the request's content type. A multipart body without a `file` part
/// yields no bytes.
async fn read_upload(state: &AppState, request: Request) -> Result<(Vec<u8>, String)> {
    let request_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !request_type.starts_with("multipart/form-data") {
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| rejection(e.status(), e.body_text()))?;
        return Ok((body.to_vec(), request_type));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| rejection(e.status(), e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejection(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| rejection(e.status(), e.body_text()))?;
        return Ok((bytes.to_vec(), content_type));
    }

    debug!("Multipart body has no file part");
    Ok((Vec::new(), String::new()))
}

/// `POST /convert`
///
/// Converts a document to normalized text. The document is either the
/// multipart `file` field or the raw request body.
#[utoipa::path(
    post,
    path = "/convert",
    tag = "conversion",
    params(ExtractionOptions),
    request_body(content_type = "multipart/form-data", content = String, description = "Multipart `file` field, or the raw document with its own Content-Type"),
    responses(
        (status = 200, description = "Document converted", body = ExtractionResult),
        (status = 400, description = "No file data provided"),
        (status = 413, description = "Payload too large"),
        (status = 415, description = "Unsupported Media Type"),
        (status = 503, description = "Required engine unavailable"),
    )
)]
pub async fn convert(
    State(state): State<AppState>,
    Query(options): Query<ExtractionOptions>,
    request: Request,
) -> Result<Json<ExtractionResult>> {
    let (bytes, content_type) = read_upload(&state, request).await?;
    let upload = ExtractionRequest::new(bytes, content_type, options);

    let service = Arc::clone(&state.service);
    let span = info_span!("convert", request_id = %Uuid::new_v4());
    let result = run_blocking(span, move || service.convert(&upload)).await?;

    Ok(Json(result))
}

/// `POST /extract_pdf`
///
/// Native text and tables of a raw PDF body. Never runs OCR.
#[utoipa::path(
    post,
    path = "/extract_pdf",
    tag = "conversion",
    request_body(content_type = "application/pdf", content = String),
    responses(
        (status = 200, description = "Text and tables extracted", body = ExtractPdfResponse),
        (status = 400, description = "No PDF data provided"),
    )
)]
pub async fn extract_pdf(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ExtractPdfResponse>> {
    let service = Arc::clone(&state.service);
    let span = info_span!("extract_pdf", request_id = %Uuid::new_v4());
    let extraction = run_blocking(span, move || service.extract_pdf(&body)).await?;

    Ok(Json(extraction.into()))
}

/// `POST /convert_tables_to_csv`
#[utoipa::path(
    post,
    path = "/convert_tables_to_csv",
    tag = "conversion",
    request_body = TablesToCsvRequest,
    responses(
        (status = 200, description = "One CSV document per table", body = TablesToCsvResponse),
        (status = 400, description = "No tables data provided"),
    )
)]
pub async fn convert_tables_to_csv(
    Json(request): Json<TablesToCsvRequest>,
) -> Result<Json<TablesToCsvResponse>> {
    if request.tables.is_empty() {
        return Err(DocfluxError::NoData("No tables data provided".to_string()));
    }

    let csv_data = request
        .tables
        .iter()
        .map(|table| {
            let rows: Vec<Vec<String>> = table
                .iter()
                .map(|row| row.iter().map(cell_to_string).collect())
                .collect();
            rows_to_csv(&rows)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(TablesToCsvResponse { csv_data }))
}

/// `GET /health`
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
