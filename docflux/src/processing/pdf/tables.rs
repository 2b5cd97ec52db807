use std::path::Path;

use lopdf::Document;
use tracing::debug;

use crate::error::{DocfluxError, Result};
use crate::models::{Table, TableFlavor};

use super::layout::{document_layout, PageLayout, Ruling, TextRun};
use super::{catch_parser_panic, TableDetector};

/// Runs on one line closer than this fraction of the font size merge into
/// a single cell.
const WORD_GAP: f32 = 0.6;

/// Baselines within this fraction of the font size share a row.
const BASELINE_TOLERANCE: f32 = 0.3;

/// A vertical gap larger than this many font sizes ends a table.
const MAX_ROW_GAP: f32 = 2.5;

/// Ruling coordinates within this many points are the same grid line.
const EDGE_TOLERANCE: f32 = 2.0;

/// Text runs sharing a baseline, merged into cells left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRow {
    pub y: f32,
    pub size: f32,
    pub cells: Vec<TextRun>,
}

fn merge_cells(mut runs: Vec<TextRun>) -> Vec<TextRun> {
    runs.sort_by(|a, b| a.x.total_cmp(&b.x));
    let mut cells: Vec<TextRun> = Vec::new();

    for run in runs {
        if let Some(last) = cells.last_mut() {
            let gap = run.x - (last.x + last.width);
            let size = last.size.max(run.size);
            if gap < size * WORD_GAP {
                if gap > size * 0.1 {
                    last.text.push(' ');
                }
                last.text.push_str(&run.text);
                last.width = (run.x + run.width - last.x).max(last.width);
                continue;
            }
        }
        cells.push(run);
    }

    cells
}

/// Group runs into rows, top of the page first.
pub fn layout_rows(runs: &[TextRun]) -> Vec<LayoutRow> {
    let mut sorted = runs.to_vec();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut grouped: Vec<(f32, f32, Vec<TextRun>)> = Vec::new();
    for run in sorted {
        match grouped.last_mut() {
            Some((y, size, members))
                if (*y - run.y).abs() <= size.max(run.size).max(1.0) * BASELINE_TOLERANCE =>
            {
                *size = size.max(run.size);
                members.push(run);
            }
            _ => grouped.push((run.y, run.size, vec![run])),
        }
    }

    grouped
        .into_iter()
        .map(|(y, size, members)| LayoutRow {
            y,
            size,
            cells: merge_cells(members),
        })
        .collect()
}

/// Column extents: the union of overlapping cell spans across all rows.
fn column_spans(rows: &[LayoutRow]) -> Vec<(f32, f32)> {
    let mut spans: Vec<(f32, f32)> = rows
        .iter()
        .flat_map(|row| row.cells.iter().map(|c| (c.x, c.x + c.width)))
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f32, f32)> = Vec::new();
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn append_cell(cell: &mut String, text: &str) {
    if !cell.is_empty() {
        cell.push(' ');
    }
    cell.push_str(text);
}

/// Borderless tables: consecutive rows of two or more separated cells whose
/// positions line up into columns.
#[derive(Debug, Clone)]
pub struct StreamDetector {
    min_rows: usize,
    min_columns: usize,
}

impl Default for StreamDetector {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
        }
    }
}

impl StreamDetector {
    pub fn tables_in_layout(&self, layout: &PageLayout) -> Vec<Vec<Vec<String>>> {
        let mut tables = Vec::new();
        let mut block: Vec<LayoutRow> = Vec::new();

        for row in layout_rows(&layout.runs) {
            let is_row = row.cells.len() >= self.min_columns;
            let continues = block.last().is_some_and(|prev| {
                prev.y - row.y <= prev.size.max(row.size) * MAX_ROW_GAP
            });

            if is_row && (block.is_empty() || continues) {
                block.push(row);
                continue;
            }

            self.flush(&mut block, &mut tables);
            if is_row {
                block.push(row);
            }
        }
        self.flush(&mut block, &mut tables);

        tables
    }

    fn flush(&self, block: &mut Vec<LayoutRow>, tables: &mut Vec<Vec<Vec<String>>>) {
        let rows = std::mem::take(block);
        if rows.len() < self.min_rows {
            return;
        }
        let spans = column_spans(&rows);
        if spans.len() < self.min_columns {
            return;
        }

        let grid = rows
            .iter()
            .map(|row| {
                let mut cells = vec![String::new(); spans.len()];
                for cell in &row.cells {
                    if let Some(col) = spans.iter().position(|(s, e)| cell.x >= *s && cell.x <= *e)
                    {
                        append_cell(&mut cells[col], &cell.text);
                    }
                }
                cells
            })
            .collect();
        tables.push(grid);
    }
}

fn load_document(pdf_path: &Path) -> Result<Document> {
    catch_parser_panic(|| Document::load(pdf_path))
        .map_err(|panic| DocfluxError::TableDetection(format!("PDF parser panicked: {panic}")))?
        .map_err(|e| DocfluxError::TableDetection(format!("Failed to load PDF: {e}")))
}

/// Page layouts of a PDF on disk. A parser panic is reported as an error.
fn read_layouts(pdf_path: &Path) -> Result<Vec<(u32, PageLayout)>> {
    let doc = load_document(pdf_path)?;
    catch_parser_panic(|| document_layout(&doc))
        .map_err(|panic| DocfluxError::TableDetection(format!("PDF layout panicked: {panic}")))
}

impl TableDetector for StreamDetector {
    fn flavor(&self) -> TableFlavor {
        TableFlavor::Stream
    }

    fn detect(&self, pdf_path: &Path) -> Result<Vec<Table>> {
        let tables: Vec<Table> = read_layouts(pdf_path)?
            .iter()
            .flat_map(|(page, layout)| {
                self.tables_in_layout(layout)
                    .into_iter()
                    .map(move |rows| Table::on_page(*page, rows))
            })
            .collect();

        debug!(tables = tables.len(), "Stream table detection finished");
        Ok(tables)
    }
}

/// Sorted, de-duplicated grid line positions.
fn grid_lines(values: impl Iterator<Item = f32>) -> Vec<f32> {
    let mut values: Vec<f32> = values.collect();
    values.sort_by(f32::total_cmp);
    values.dedup_by(|next, kept| (*next - *kept).abs() <= EDGE_TOLERANCE);
    values
}

/// Ruled tables. Vertical and horizontal rulings on a page form a grid and
/// every text run lands in the cell that contains its origin.
#[derive(Debug, Clone)]
pub struct LatticeDetector {
    min_rulings: usize,
}

impl Default for LatticeDetector {
    fn default() -> Self {
        Self { min_rulings: 4 }
    }
}

impl LatticeDetector {
    pub fn table_in_layout(&self, layout: &PageLayout) -> Option<Vec<Vec<String>>> {
        if layout.rulings.len() < self.min_rulings {
            return None;
        }

        let xs = grid_lines(layout.rulings.iter().filter_map(|r| match r {
            Ruling::Vertical { x, .. } => Some(*x),
            Ruling::Horizontal { .. } => None,
        }));
        let mut ys = grid_lines(layout.rulings.iter().filter_map(|r| match r {
            Ruling::Horizontal { y, .. } => Some(*y),
            Ruling::Vertical { .. } => None,
        }));
        ys.reverse();

        if xs.len() < 2 || ys.len() < 2 || (xs.len() - 1) * (ys.len() - 1) < 2 {
            return None;
        }

        let mut grid = vec![vec![String::new(); xs.len() - 1]; ys.len() - 1];
        for row in layout_rows(&layout.runs) {
            for cell in &row.cells {
                let col = xs
                    .windows(2)
                    .position(|w| cell.x >= w[0] - EDGE_TOLERANCE && cell.x < w[1]);
                let line = ys
                    .windows(2)
                    .position(|w| cell.y <= w[0] + EDGE_TOLERANCE && cell.y > w[1]);
                if let (Some(col), Some(line)) = (col, line) {
                    append_cell(&mut grid[line][col], &cell.text);
                }
            }
        }

        grid.retain(|row| row.iter().any(|cell| !cell.is_empty()));
        (!grid.is_empty()).then_some(grid)
    }
}

impl TableDetector for LatticeDetector {
    fn flavor(&self) -> TableFlavor {
        TableFlavor::Lattice
    }

    fn detect(&self, pdf_path: &Path) -> Result<Vec<Table>> {
        let tables: Vec<Table> = read_layouts(pdf_path)?
            .iter()
            .filter_map(|(page, layout)| {
                self.table_in_layout(layout)
                    .map(|rows| Table::on_page(*page, rows))
            })
            .collect();

        debug!(tables = tables.len(), "Lattice table detection finished");
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(x: f32, y: f32, text: &str) -> TextRun {
        TextRun {
            x,
            y,
            width: text.chars().count() as f32 * 6.0,
            size: 12.0,
            text: text.to_string(),
        }
    }

    fn price_list() -> Vec<TextRun> {
        vec![
            run(72.0, 760.0, "Price list for the spring catalogue"),
            run(72.0, 700.0, "Item"),
            run(222.0, 700.0, "Qty"),
            run(372.0, 700.0, "Price"),
            run(72.0, 680.0, "Apple"),
            run(222.0, 680.0, "3"),
            run(372.0, 680.0, "1.20"),
            run(72.0, 660.0, "Pear"),
            run(228.0, 660.3, "10"),
            run(372.0, 660.0, "0.80"),
            run(72.0, 600.0, "Prices include tax."),
        ]
    }

    #[test]
    fn test_rows_group_by_baseline_and_merge_words() {
        let runs = vec![
            run(72.0, 700.0, "Widget"),
            run(112.0, 700.2, "A"),
            run(222.0, 700.0, "100"),
        ];

        let rows = layout_rows(&runs);
        assert_eq!(rows.len(), 1);
        let texts: Vec<_> = rows[0].cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Widget A", "100"]);
    }

    #[test]
    fn test_stream_finds_positioned_table() {
        let layout = PageLayout {
            runs: price_list(),
            rulings: vec![],
        };

        let tables = StreamDetector::default().tables_in_layout(&layout);
        assert_eq!(
            tables,
            vec![vec![
                vec!["Item", "Qty", "Price"],
                vec!["Apple", "3", "1.20"],
                vec!["Pear", "10", "0.80"],
            ]]
        );
    }

    #[test]
    fn test_stream_ignores_prose() {
        let layout = PageLayout {
            runs: vec![
                run(72.0, 700.0, "This is a paragraph of prose."),
                run(72.0, 686.0, "It is one run per line."),
            ],
            rulings: vec![],
        };
        assert!(StreamDetector::default().tables_in_layout(&layout).is_empty());
    }

    #[test]
    fn test_stream_requires_two_rows() {
        let layout = PageLayout {
            runs: vec![run(72.0, 700.0, "Lonely"), run(222.0, 700.0, "row")],
            rulings: vec![],
        };
        assert!(StreamDetector::default().tables_in_layout(&layout).is_empty());
    }

    #[test]
    fn test_stream_splits_tables_on_large_gap() {
        let layout = PageLayout {
            runs: vec![
                run(72.0, 700.0, "a"),
                run(222.0, 700.0, "b"),
                run(72.0, 686.0, "c"),
                run(222.0, 686.0, "d"),
                run(72.0, 500.0, "e"),
                run(222.0, 500.0, "f"),
                run(72.0, 486.0, "g"),
                run(222.0, 486.0, "h"),
            ],
            rulings: vec![],
        };

        let tables = StreamDetector::default().tables_in_layout(&layout);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1][0], vec!["e", "f"]);
    }

    #[test]
    fn test_stream_leaves_missing_cells_empty() {
        let layout = PageLayout {
            runs: vec![
                run(72.0, 700.0, "Rent"),
                run(222.0, 700.0, "900"),
                run(372.0, 700.0, "monthly"),
                run(72.0, 680.0, "Food"),
                run(372.0, 680.0, "weekly"),
            ],
            rulings: vec![],
        };

        let tables = StreamDetector::default().tables_in_layout(&layout);
        assert_eq!(tables[0][1], vec!["Food", "", "weekly"]);
    }

    fn grid_rulings(xs: &[f32], ys: &[f32]) -> Vec<Ruling> {
        let (x0, x1) = (xs[0], xs[xs.len() - 1]);
        let (y0, y1) = (ys[ys.len() - 1], ys[0]);
        xs.iter()
            .map(|&x| Ruling::Vertical { x, y0, y1 })
            .chain(ys.iter().map(|&y| Ruling::Horizontal { y, x0, x1 }))
            .collect()
    }

    #[test]
    fn test_lattice_assigns_runs_to_ruled_cells() {
        let layout = PageLayout {
            runs: vec![
                run(72.0, 700.0, "Item"),
                run(222.0, 700.0, "Amount"),
                run(72.0, 680.0, "Rent"),
                run(222.0, 680.0, "900"),
                run(72.0, 600.0, "Outside the grid"),
            ],
            rulings: grid_rulings(&[62.0, 212.0, 362.0], &[715.0, 695.0, 675.0]),
        };

        let table = LatticeDetector::default().table_in_layout(&layout).unwrap();
        assert_eq!(table, vec![vec!["Item", "Amount"], vec!["Rent", "900"]]);
    }

    #[test]
    fn test_lattice_drops_empty_rows_and_merges_duplicate_edges() {
        let mut rulings = grid_rulings(&[62.0, 212.0, 362.0], &[715.0, 695.0, 675.0]);
        rulings.push(Ruling::Vertical {
            x: 212.5,
            y0: 675.0,
            y1: 715.0,
        });
        let layout = PageLayout {
            runs: vec![run(72.0, 700.0, "Only"), run(222.0, 700.0, "row")],
            rulings,
        };

        let table = LatticeDetector::default().table_in_layout(&layout).unwrap();
        assert_eq!(table, vec![vec!["Only", "row"]]);
    }

    #[test]
    fn test_lattice_needs_enough_rulings() {
        let layout = PageLayout {
            runs: price_list(),
            rulings: vec![Ruling::Horizontal {
                y: 650.0,
                x0: 72.0,
                x1: 500.0,
            }],
        };
        assert_eq!(LatticeDetector::default().table_in_layout(&layout), None);
    }

    #[test]
    fn test_detectors_fail_on_missing_file() {
        let path = Path::new("/nonexistent/docflux/input.pdf");
        assert!(StreamDetector::default().detect(path).is_err());
        assert!(LatticeDetector::default().detect(path).is_err());
    }
}
