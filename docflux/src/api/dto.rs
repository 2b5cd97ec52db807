//! Request and response bodies for the JSON endpoints. `/convert` answers
//! with [`ExtractionResult`](crate::models::ExtractionResult) directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::processing::pdf::PdfExtraction;

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Native text and detected tables of a PDF, without OCR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct ExtractPdfResponse {
    /// Page texts joined with a newline.
    pub text: String,
    /// One row grid per detected table.
    pub tables: Vec<Vec<Vec<String>>>,
}

impl From<PdfExtraction> for ExtractPdfResponse {
    fn from(extraction: PdfExtraction) -> Self {
        let text = extraction
            .pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let tables = extraction
            .tables
            .into_iter()
            .map(|table| table.rows)
            .collect();

        Self { text, tables }
    }
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct TablesToCsvRequest {
    /// Tables as row grids. Cells may be any JSON scalar; `null` becomes an
    /// empty field.
    #[serde(default)]
    #[schema(value_type = Vec<Vec<Vec<Object>>>)]
    pub tables: Vec<Vec<Vec<Value>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct TablesToCsvResponse {
    /// One CSV document per input table, no header or index column.
    pub csv_data: Vec<String>,
}

/// Render a JSON cell the way it reads in a spreadsheet.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
