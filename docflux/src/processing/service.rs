use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{DocfluxError, Result};
use crate::models::{ExtractionRequest, ExtractionResult};

use super::classifier::classify;
use super::normalizer::normalize;
use super::pdf::PdfExtraction;
use super::registry::{Engines, ExtractorRegistry};

/// Validates a request, classifies it, dispatches it to its strategy, and
/// normalizes the output. Synchronous; callers on an async runtime should
/// run it on the blocking pool.
pub struct ConversionService {
    registry: ExtractorRegistry,
    scratch_dir: PathBuf,
}

impl ConversionService {
    pub fn new(config: &Config, engines: Engines) -> Self {
        Self {
            registry: ExtractorRegistry::new(config, engines),
            scratch_dir: config.upload.dir.clone(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn convert(&self, request: &ExtractionRequest) -> Result<ExtractionResult> {
        if request.is_empty() {
            return Err(DocfluxError::NoData("No file data provided".to_string()));
        }

        let format = classify(request.content_type())
            .ok_or_else(|| DocfluxError::UnsupportedMediaType(request.content_type().to_string()))?;

        info!(
            format = %format,
            content_type = request.content_type(),
            bytes = request.bytes().len(),
            "Converting document"
        );

        let output = self
            .registry
            .get(format)
            .extract(request, &self.scratch_dir)?;
        let result = normalize(format, output);

        info!(
            format = %format,
            ocr = result.ocr,
            content_len = result.content.len(),
            pages = result.pages().len(),
            tables = result.tables().len(),
            "Conversion finished"
        );
        Ok(result)
    }

    /// Native text and tables only, without the OCR decision.
    pub fn extract_pdf(&self, pdf: &[u8]) -> Result<PdfExtraction> {
        if pdf.is_empty() {
            return Err(DocfluxError::NoData("No PDF data provided".to_string()));
        }

        let extraction = self.registry.pdf().cascade().extract_text_and_tables(pdf);
        debug!(
            pages = extraction.pages.len(),
            tables = extraction.tables.len(),
            "PDF text and tables extracted"
        );
        Ok(extraction)
    }
}
