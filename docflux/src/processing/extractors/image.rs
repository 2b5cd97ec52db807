use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use exif::{In, Reader};
use tracing::warn;

use crate::config::OcrConfig;
use crate::error::Result;
use crate::models::ExtractionRequest;
use crate::ocr::{preprocess_image, TextRecognizer};
use crate::processing::normalizer::ExtractorOutput;

use super::ExtractionStrategy;

/// Every primary-IFD EXIF field, keyed by tag name. Images without EXIF
/// yield an empty map.
pub fn exif_metadata(bytes: &[u8]) -> BTreeMap<String, String> {
    let Ok(exif) = Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
        return BTreeMap::new();
    };

    exif.fields()
        .filter(|field| field.ifd_num == In::PRIMARY)
        .map(|field| {
            (
                field.tag.to_string(),
                field.display_value().with_unit(&exif).to_string(),
            )
        })
        .collect()
}

/// OCR over a single image plus its EXIF fields. Recognition failures
/// produce empty content rather than an error.
pub struct ImageStrategy {
    recognizer: Arc<dyn TextRecognizer>,
    config: OcrConfig,
}

impl ImageStrategy {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: OcrConfig) -> Self {
        Self { recognizer, config }
    }

    fn recognize(&self, bytes: &[u8]) -> Result<String> {
        let processed = preprocess_image(bytes, &self.config)?;
        let text = self.recognizer.recognize(&processed, &self.config.languages)?;
        Ok(text.trim().to_string())
    }
}

impl ExtractionStrategy for ImageStrategy {
    fn extract(&self, request: &ExtractionRequest, _scratch_dir: &Path) -> Result<ExtractorOutput> {
        let metadata = exif_metadata(request.bytes());
        let content = self.recognize(request.bytes()).unwrap_or_else(|e| {
            warn!(error = %e, "Image OCR failed, returning empty content");
            String::new()
        });

        Ok(ExtractorOutput::Image { content, metadata })
    }
}
