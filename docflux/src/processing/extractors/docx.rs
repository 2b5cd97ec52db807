use std::path::Path;

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent};

use crate::error::{DocfluxError, Result};
use crate::models::ExtractionRequest;
use crate::processing::normalizer::ExtractorOutput;

use super::ExtractionStrategy;

/// Body paragraphs first, then every table row as `cell | cell`. Blank
/// lines are dropped.
pub struct DocxExtractor;

impl DocxExtractor {
    pub fn parse(bytes: &[u8]) -> Result<String> {
        let docx = docx_rs::read_docx(bytes)
            .map_err(|e| DocfluxError::Processing(format!("DOCX parse error: {e}")))?;

        let mut paragraphs = Vec::new();
        let mut table_rows = Vec::new();
        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(paragraph) => {
                    paragraphs.push(Self::paragraph_text(paragraph))
                }
                DocumentChild::Table(table) => table_rows.extend(Self::table_rows(table)),
                _ => {}
            }
        }

        let lines: Vec<String> = paragraphs
            .into_iter()
            .chain(table_rows)
            .filter(|line| !line.trim().is_empty())
            .collect();
        Ok(lines.join("\n"))
    }

    fn paragraph_text(paragraph: &Paragraph) -> String {
        let mut content = String::new();
        for para_child in &paragraph.children {
            if let ParagraphChild::Run(run) = para_child {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(text) => content.push_str(&text.text),
                        RunChild::Tab(_) => content.push('\t'),
                        _ => {}
                    }
                }
            }
        }
        content
    }

    fn table_rows(table: &Table) -> Vec<String> {
        table
            .rows
            .iter()
            .map(|table_child| {
                let docx_rs::TableChild::TableRow(row) = table_child;
                row.cells
                    .iter()
                    .map(|row_child| {
                        let docx_rs::TableRowChild::TableCell(cell) = row_child;
                        cell.children
                            .iter()
                            .filter_map(|content| match content {
                                TableCellContent::Paragraph(para) => {
                                    Some(Self::paragraph_text(para))
                                }
                                _ => None,
                            })
                            .collect::<Vec<_>>()
                            .join("\n")
                    })
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect()
    }
}

impl ExtractionStrategy for DocxExtractor {
    fn extract(&self, request: &ExtractionRequest, _scratch_dir: &Path) -> Result<ExtractorOutput> {
        Ok(ExtractorOutput::Text {
            content: Self::parse(request.bytes())?,
        })
    }
}
