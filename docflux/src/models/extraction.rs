use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use super::FormatCategory;

/// Text of one PDF page. `index` is 1-based; `text` may be empty but is
/// always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: u32,
    pub text: String,
}

impl Page {
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Build 1-based pages from texts in document order.
    pub fn from_texts<I, S>(texts: I) -> Vec<Page>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .zip(1u32..)
            .map(|(text, index)| Page::new(index, text))
            .collect()
    }

    /// Whitespace-only pages count as empty for OCR decisions.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Where a table came from: a PDF page number or a spreadsheet sheet name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableOrigin {
    Page(u32),
    Sheet(String),
}

/// A rectangular grid of string cells. Rows are padded with `""` to the
/// widest row on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    #[serde(flatten)]
    pub origin: TableOrigin,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(origin: TableOrigin, rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { origin, rows }
    }

    pub fn on_page(page: u32, rows: Vec<Vec<String>>) -> Self {
        Self::new(TableOrigin::Page(page), rows)
    }

    pub fn on_sheet(sheet: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self::new(TableOrigin::Sheet(sheet.into()), rows)
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }
}

/// Table detection strategy. `Stream` reads whitespace-aligned columns,
/// `Lattice` relies on ruling lines drawn on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFlavor {
    Stream,
    Lattice,
}

impl std::fmt::Display for TableFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Lattice => write!(f, "lattice"),
        }
    }
}

/// Result of a recoverable pipeline stage. A degraded stage never fails the
/// request; its reason is logged and the cascade continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    Ok(T),
    Degraded { reason: String },
}

impl<T> StageOutcome<T> {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { reason } => Some(reason),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Degraded { .. } => None,
        }
    }

    pub fn value_or(self, fallback: T) -> T {
        self.ok().unwrap_or(fallback)
    }
}

/// Ordered recognizer output for one audio stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub segments: Vec<String>,
}

impl Transcript {
    /// Keep non-empty segments in arrival order.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { segments }
    }

    pub fn text(&self) -> String {
        self.segments.join(" ")
    }
}

fn serialize_page_texts<S>(pages: &Option<Vec<Page>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match pages {
        Some(pages) => serializer.collect_seq(pages.iter().map(|p| p.text.as_str())),
        None => serializer.serialize_none(),
    }
}

/// Normalized output of every conversion.
///
/// `pages` and `tables` are only present for formats that produce them.
/// When pages exist, `content` is their texts joined with a blank line; when
/// `ocr` is set, `tables` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ExtractionResult {
    pub format: FormatCategory,
    pub content: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_page_texts"
    )]
    #[schema(value_type = Option<Vec<String>>)]
    pub pages: Option<Vec<Page>>,
    /// `{"page": n, "rows": [[..]]}` or `{"sheet": "...", "rows": [[..]]}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Vec<Object>>)]
    pub tables: Option<Vec<Table>>,
    pub ocr: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ExtractionResult {
    pub fn text(format: FormatCategory, content: impl Into<String>) -> Self {
        Self {
            format,
            content: content.into(),
            pages: None,
            tables: None,
            ocr: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn tables(&self) -> &[Table] {
        self.tables.as_deref().unwrap_or(&[])
    }

    pub fn pages(&self) -> &[Page] {
        self.pages.as_deref().unwrap_or(&[])
    }
}
