use crate::error::{DocfluxError, Result};

use super::{catch_parser_panic, NativeTextExtractor};

/// Embedded text layer via `pdf-extract`. The parser panics on some
/// malformed documents; that is reported as an extraction error.
pub struct PdfTextLayer;

impl NativeTextExtractor for PdfTextLayer {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>> {
        catch_parser_panic(|| pdf_extract::extract_text_from_mem_by_pages(pdf))
            .map_err(|panic| DocfluxError::Processing(format!("PDF text extraction panicked: {panic}")))?
            .map_err(|e| DocfluxError::Processing(format!("PDF text extraction failed: {e}")))
    }
}
