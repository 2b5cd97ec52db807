use std::collections::BTreeMap;

use crate::models::{ExtractionResult, FormatCategory, Page, Table, Transcript};

/// Native output shape of each extraction strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorOutput {
    /// PDF cascade result.
    Paged {
        pages: Vec<Page>,
        tables: Vec<Table>,
        ocr: bool,
    },
    Text {
        content: String,
    },
    /// Spreadsheets and CSV.
    Tabular {
        content: String,
        tables: Vec<Table>,
    },
    Image {
        content: String,
        metadata: BTreeMap<String, String>,
    },
    Transcript(Transcript),
}

/// Separator between page texts in `content`.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Map an extractor's output onto the shared result schema.
///
/// Paged output always yields `content == pages.join("\n\n")`, and OCR'd
/// output never carries tables, whatever the extractor handed over.
pub fn normalize(format: FormatCategory, output: ExtractorOutput) -> ExtractionResult {
    match output {
        ExtractorOutput::Paged { pages, tables, ocr } => {
            let content = pages
                .iter()
                .map(|page| page.text.as_str())
                .collect::<Vec<_>>()
                .join(PAGE_SEPARATOR);
            let tables = if ocr { Vec::new() } else { tables };

            ExtractionResult {
                pages: Some(pages),
                tables: Some(tables),
                ocr,
                ..ExtractionResult::text(format, content)
            }
        }
        ExtractorOutput::Text { content } => ExtractionResult::text(format, content),
        ExtractorOutput::Tabular { content, tables } => ExtractionResult {
            tables: Some(tables),
            ..ExtractionResult::text(format, content)
        },
        ExtractorOutput::Image { content, metadata } => ExtractionResult {
            ocr: true,
            metadata,
            ..ExtractionResult::text(format, content)
        },
        ExtractorOutput::Transcript(transcript) => {
            ExtractionResult::text(format, transcript.text())
        }
    }
}
