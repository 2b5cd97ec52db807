use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocfluxError {
    /// The declared content type matched no known format.
    #[error("Unsupported Media Type: {0}")]
    UnsupportedMediaType(String),

    /// The request carried no payload. Holds the client-facing message.
    #[error("{0}")]
    NoData(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Table detection error: {0}")]
    TableDetection(String),

    #[error("Rasterization error: {0}")]
    Rasterization(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Transcription unavailable: {0}")]
    TranscriptionUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DocfluxError {
    pub fn status(&self) -> StatusCode {
        match self {
            DocfluxError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DocfluxError::NoData(_) | DocfluxError::Validation(_) | DocfluxError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            DocfluxError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DocfluxError::OcrUnavailable(_) | DocfluxError::TranscriptionUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DocfluxError::Processing(_)
            | DocfluxError::TableDetection(_)
            | DocfluxError::Rasterization(_)
            | DocfluxError::Ocr(_)
            | DocfluxError::Transcription(_)
            | DocfluxError::Io(_)
            | DocfluxError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DocfluxError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            DocfluxError::UnsupportedMediaType(_) => "Unsupported Media Type".to_string(),
            DocfluxError::NoData(msg)
            | DocfluxError::Validation(msg)
            | DocfluxError::PayloadTooLarge(msg)
            | DocfluxError::Processing(msg)
            | DocfluxError::TableDetection(msg)
            | DocfluxError::Rasterization(msg)
            | DocfluxError::Ocr(msg)
            | DocfluxError::OcrUnavailable(msg)
            | DocfluxError::Transcription(msg)
            | DocfluxError::TranscriptionUnavailable(msg)
            | DocfluxError::Internal(msg) => msg.clone(),
            DocfluxError::Json(e) => e.to_string(),
            DocfluxError::Io(e) => e.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, status = status.as_u16(), "Request failed");
        }

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, DocfluxError>;
