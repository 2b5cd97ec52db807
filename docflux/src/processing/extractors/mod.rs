//! Per-format extraction strategies.
//!
//! Parsing lives in unit-struct extractors with a plain `parse` function;
//! each format also has an [`ExtractionStrategy`] implementation that the
//! registry dispatches to. Strategies run synchronously on the caller's
//! thread and place any on-disk artifacts under `scratch_dir`.

pub mod audio;
pub mod csv;
pub mod docx;
pub mod html;
pub mod image;
pub mod pdf;
pub mod pptx;
pub mod text;
pub mod xlsx;

use std::path::Path;

use crate::error::Result;
use crate::models::ExtractionRequest;

use super::normalizer::ExtractorOutput;

pub use audio::AudioStrategy;
pub use csv::{rows_to_csv, CsvExtractor};
pub use docx::DocxExtractor;
pub use html::HtmlExtractor;
pub use image::ImageStrategy;
pub use pdf::PdfStrategy;
pub use pptx::PptxExtractor;
pub use text::TextExtractor;
pub use xlsx::{SpreadsheetStrategy, XlsxExtractor};

pub trait ExtractionStrategy: Send + Sync {
    fn extract(&self, request: &ExtractionRequest, scratch_dir: &Path) -> Result<ExtractorOutput>;
}
