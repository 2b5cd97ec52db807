use std::path::Path;

use crate::error::Result;
use crate::models::ExtractionRequest;
use crate::processing::normalizer::ExtractorOutput;

use super::ExtractionStrategy;

pub struct TextExtractor;

impl TextExtractor {
    /// Lossy UTF-8 decode. JSON payloads are pretty-printed, or returned
    /// as-is when they do not parse.
    pub fn parse(bytes: &[u8], content_type: &str) -> String {
        let data = String::from_utf8_lossy(bytes).into_owned();
        if !Self::is_json(content_type) {
            return data;
        }

        serde_json::from_str::<serde_json::Value>(&data)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or(data)
    }

    fn is_json(content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .is_some_and(|essence| essence.trim().to_ascii_lowercase().ends_with("json"))
    }
}

impl ExtractionStrategy for TextExtractor {
    fn extract(&self, request: &ExtractionRequest, _scratch_dir: &Path) -> Result<ExtractorOutput> {
        Ok(ExtractorOutput::Text {
            content: Self::parse(request.bytes(), request.content_type()),
        })
    }
}
