use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::{DocfluxError, Result};
use crate::models::{ExtractionRequest, Table};
use crate::processing::normalizer::ExtractorOutput;

use super::csv::{rows_to_csv, CsvExtractor};
use super::ExtractionStrategy;

pub struct XlsxExtractor;

impl XlsxExtractor {
    /// One table per worksheet, header row first. Content is a
    /// `## <sheet>` heading followed by the sheet as CSV, sheets separated
    /// by a blank line.
    pub fn parse(bytes: &[u8]) -> Result<(String, Vec<Table>)> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| DocfluxError::Processing(format!("Spreadsheet parse error: {e}")))?;

        let mut tables = Vec::new();
        let mut sections = Vec::new();
        for (name, range) in workbook.worksheets() {
            let rows: Vec<Vec<String>> = range
                .rows()
                .map(|row| row.iter().map(Self::format_cell_value).collect())
                .collect();

            let table = Table::on_sheet(name.clone(), rows);
            sections.push(format!("## {name}\n{}", rows_to_csv(&table.rows)?));
            tables.push(table);
        }

        Ok((sections.join("\n\n"), tables))
    }

    fn format_cell_value(cell: &Data) -> String {
        match cell {
            Data::String(s) => s.clone(),
            Data::Int(i) => i.to_string(),
            Data::Float(f) => {
                let s = format!("{f}");
                if s.contains('.') {
                    s.trim_end_matches('0').trim_end_matches('.').to_string()
                } else {
                    s
                }
            }
            Data::Bool(b) => b.to_string(),
            Data::DateTime(dt) => dt.to_string(),
            Data::DateTimeIso(dt) => dt.to_string(),
            Data::DurationIso(d) => d.to_string(),
            _ => String::new(),
        }
    }
}

/// Excel dispatch: `text/csv` goes through the CSV reader, everything else
/// through calamine.
pub struct SpreadsheetStrategy;

impl SpreadsheetStrategy {
    pub fn is_csv(content_type: &str) -> bool {
        content_type
            .split(';')
            .next()
            .is_some_and(|essence| essence.trim().to_ascii_lowercase().ends_with("csv"))
    }
}

impl ExtractionStrategy for SpreadsheetStrategy {
    fn extract(&self, request: &ExtractionRequest, _scratch_dir: &Path) -> Result<ExtractorOutput> {
        let (content, tables) = if Self::is_csv(request.content_type()) {
            let (content, table) = CsvExtractor::parse(request.bytes())?;
            (content, vec![table])
        } else {
            XlsxExtractor::parse(request.bytes())?
        };
        Ok(ExtractorOutput::Tabular { content, tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cell_value() {
        assert_eq!(
            XlsxExtractor::format_cell_value(&Data::String("hello".to_string())),
            "hello"
        );
        assert_eq!(XlsxExtractor::format_cell_value(&Data::Int(42)), "42");
        assert_eq!(XlsxExtractor::format_cell_value(&Data::Float(2.5)), "2.5");
        assert_eq!(XlsxExtractor::format_cell_value(&Data::Float(100.0)), "100");
        assert_eq!(XlsxExtractor::format_cell_value(&Data::Bool(true)), "true");
        assert_eq!(XlsxExtractor::format_cell_value(&Data::Empty), "");
    }

    #[test]
    fn test_is_csv() {
        assert!(SpreadsheetStrategy::is_csv("text/csv"));
        assert!(SpreadsheetStrategy::is_csv("text/csv; charset=utf-8"));
        assert!(!SpreadsheetStrategy::is_csv(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        ));
    }

    #[test]
    fn test_csv_request_produces_csv_sheet() {
        let request = ExtractionRequest::new(
            b"a,b\n1,2\n".to_vec(),
            "text/csv",
            Default::default(),
        );
        let scratch = tempfile::tempdir().unwrap();

        match SpreadsheetStrategy.extract(&request, scratch.path()).unwrap() {
            ExtractorOutput::Tabular { content, tables } => {
                assert_eq!(content, "a,b\n1,2\n");
                assert_eq!(tables, vec![Table::on_sheet("CSV", vec![
                    vec!["a".into(), "b".into()],
                    vec!["1".into(), "2".into()],
                ])]);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_workbook() {
        assert!(XlsxExtractor::parse(b"definitely not a workbook").is_err());
    }
}
