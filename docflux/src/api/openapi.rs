use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use crate::models::{ExtractionResult, FormatCategory};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Docflux API",
        version = "0.1.0",
        description = "Self-hostable document extraction: PDF, office, image, HTML, text and audio to normalized text.",
    ),
    paths(
        handlers::health_check,
        handlers::convert,
        handlers::extract_pdf,
        handlers::convert_tables_to_csv,
    ),
    components(schemas(
        FormatCategory,
        ExtractionResult,
        dto::HealthResponse,
        dto::ExtractPdfResponse,
        dto::TablesToCsvRequest,
        dto::TablesToCsvResponse,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "conversion", description = "Document conversion and table export"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
