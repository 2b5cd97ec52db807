use std::path::Path;

use crate::error::Result;
use crate::models::ExtractionRequest;
use crate::processing::normalizer::ExtractorOutput;
use crate::processing::pdf::PdfCascade;

use super::ExtractionStrategy;

/// Runs the PDF cascade. `ocr` from the request wins over the configured
/// default; scanned documents are OCR'd either way.
pub struct PdfStrategy {
    cascade: PdfCascade,
    default_ocr: bool,
}

impl PdfStrategy {
    pub fn new(cascade: PdfCascade, default_ocr: bool) -> Self {
        Self {
            cascade,
            default_ocr,
        }
    }

    pub fn cascade(&self) -> &PdfCascade {
        &self.cascade
    }
}

impl ExtractionStrategy for PdfStrategy {
    fn extract(&self, request: &ExtractionRequest, _scratch_dir: &Path) -> Result<ExtractorOutput> {
        let ocr_requested = request.options().ocr.unwrap_or(self.default_ocr);
        let extraction = self.cascade.run(request.bytes(), ocr_requested);

        Ok(ExtractorOutput::Paged {
            pages: extraction.pages,
            tables: extraction.tables,
            ocr: extraction.ocr,
        })
    }
}
