use crate::error::{DocfluxError, Result};
use crate::models::Table;

/// Sheet name given to the single table of a CSV upload.
pub const CSV_SHEET: &str = "CSV";

pub struct CsvExtractor;

impl CsvExtractor {
    /// One table whose first row is the header, and the table re-serialized
    /// as comma-separated text.
    pub fn parse(bytes: &[u8]) -> Result<(String, Table)> {
        let bytes = strip_bom(bytes);

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(DocfluxError::Processing("Empty CSV file".to_string()));
        }

        let delimiter = detect_delimiter(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut rows: Vec<Vec<String>> = Vec::new();
        for result in reader.records() {
            let record = result
                .map_err(|e| DocfluxError::Processing(format!("Failed to read CSV record: {e}")))?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }

        let table = Table::on_sheet(CSV_SHEET, rows);
        let content = rows_to_csv(&table.rows)?;
        Ok((content, table))
    }
}

/// Comma-separated rows, `\n`-terminated, no header or index column added.
pub fn rows_to_csv(rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| DocfluxError::Processing(format!("Failed to write CSV row: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DocfluxError::Processing(format!("Failed to flush CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| DocfluxError::Processing(format!("Invalid UTF-8 in CSV: {e}")))
}

/// Strip UTF-8 BOM if present
fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes)
}

/// Pick the delimiter that yields the most consistent multi-column layout.
fn detect_delimiter(bytes: &[u8]) -> u8 {
    let candidates = [b',', b';', b'\t'];
    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delimiter in &candidates {
        let score = evaluate_delimiter(bytes, delimiter);
        if score > best_score {
            best_score = score;
            best_delimiter = delimiter;
        }
    }

    best_delimiter
}

fn evaluate_delimiter(bytes: &[u8], delimiter: u8) -> usize {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let column_counts: Vec<usize> = reader
        .records()
        .take(6)
        .filter_map(|r| r.ok())
        .map(|record| record.len())
        .collect();

    let Some(&first_count) = column_counts.first() else {
        return 0;
    };
    let consistent = column_counts.iter().all(|&c| c == first_count);

    match (consistent, first_count > 1) {
        (true, true) => first_count * 10,
        (false, true) => first_count,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_bom() {
        let with_bom = vec![0xEF, 0xBB, 0xBF, b'h', b'e', b'l', b'l', b'o'];
        assert_eq!(strip_bom(&with_bom), b"hello");
        assert_eq!(strip_bom(b"hello"), b"hello");
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter(b"Name,Age,City\nAlice,30,NYC"), b',');
        assert_eq!(detect_delimiter(b"Name;Age;City\nAlice;30;NYC"), b';');
        assert_eq!(detect_delimiter(b"Name\tAge\tCity\nAlice\t30\tNYC"), b'\t');
    }

    #[test]
    fn test_parse_keeps_header_row_first() {
        let (content, table) = CsvExtractor::parse(b"Name;Age\nAlice;30\nBob;\n").unwrap();

        assert_eq!(
            table.rows,
            vec![
                vec!["Name", "Age"],
                vec!["Alice", "30"],
                vec!["Bob", ""],
            ]
        );
        assert_eq!(content, "Name,Age\nAlice,30\nBob,\n");
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let (_, table) = CsvExtractor::parse(b"a,b,c\n1,2\n").unwrap();
        assert_eq!(table.rows[1], vec!["1", "2", ""]);
    }

    #[test]
    fn test_empty_csv_rejected() {
        assert!(CsvExtractor::parse(b"").is_err());
        assert!(CsvExtractor::parse(&[0xEF, 0xBB, 0xBF, b'\n']).is_err());
    }

    #[test]
    fn test_rows_to_csv_quotes_when_needed() {
        let rows = vec![
            vec!["x".to_string(), "a,b".to_string()],
            vec!["say \"hi\"".to_string(), String::new()],
        ];
        assert_eq!(rows_to_csv(&rows).unwrap(), "x,\"a,b\"\n\"say \"\"hi\"\"\",\n");
    }
}
