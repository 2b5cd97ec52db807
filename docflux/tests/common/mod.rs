//! Shared fixtures for integration tests: in-memory office documents, PDFs
//! and WAV files, plus scripted engines standing in for Tesseract,
//! `pdftoppm` and Whisper.
#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use docflux::config::{Config, UploadConfig};
use docflux::error::{DocfluxError, Result};
use docflux::models::{Table, TableFlavor};
use docflux::ocr::TextRecognizer;
use docflux::processing::pdf::{
    NativeTextExtractor, PageRasterizer, PdfCapabilities, TableDetector,
};
use docflux::processing::Engines;
use docflux::transcription::{
    AudioTranscoder, RecognizerFactory, SpeechBackend, SpeechCapabilities, StreamingRecognizer,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::{ExtendedFileOptions, FileOptions};
use zip::CompressionMethod;

pub const CSV_SAMPLE: &str = "Name,Age,City,Occupation
Alice,30,New York,Engineer
Bob,25,Los Angeles,Designer
Charlie,35,Chicago,Manager
";

/// Config pointing the scratch directory at `upload_dir`, everything else
/// at defaults.
pub fn test_config(upload_dir: &Path) -> Config {
    let mut config = Config {
        upload: UploadConfig {
            dir: upload_dir.to_path_buf(),
        },
        ..Config::default()
    };
    config.transcription.model_path = None;
    config
}

pub fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

pub fn build_docx<F>(builder_fn: F) -> Vec<u8>
where
    F: FnOnce(docx_rs::Docx) -> docx_rs::Docx,
{
    let docx = builder_fn(docx_rs::Docx::new());
    let mut buffer = Cursor::new(Vec::new());
    docx.build().pack(&mut buffer).expect("Failed to pack DOCX");
    buffer.into_inner()
}

pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    use docx_rs::{Paragraph, Run};

    build_docx(|docx| {
        paragraphs.iter().fold(docx, |docx, text| {
            docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)))
        })
    })
}

/// A zip archive with the given `(path, contents)` entries, in order.
pub fn zip_package(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options: FileOptions<ExtendedFileOptions> = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for (path, contents) in entries {
            zip.start_file(*path, options.clone()).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer.into_inner()
}

/// Workbook with an `Inventory` sheet (shared strings and numbers) and a
/// `Notes` sheet with inline strings.
pub fn xlsx_workbook() -> Vec<u8> {
    zip_package(&[
        ("[Content_Types].xml", XLSX_CONTENT_TYPES),
        ("_rels/.rels", XLSX_RELS),
        ("xl/workbook.xml", XLSX_WORKBOOK),
        ("xl/_rels/workbook.xml.rels", XLSX_WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", XLSX_INVENTORY),
        ("xl/worksheets/sheet2.xml", XLSX_NOTES),
        ("xl/sharedStrings.xml", XLSX_SHARED_STRINGS),
    ])
}

/// Two-slide deck; slide order comes from `presentation.xml`, which lists
/// `slide2.xml` first.
pub fn pptx_deck() -> Vec<u8> {
    zip_package(&[
        ("[Content_Types].xml", PPTX_CONTENT_TYPES),
        ("_rels/.rels", PPTX_RELS),
        ("ppt/presentation.xml", PPTX_PRESENTATION),
        ("ppt/_rels/presentation.xml.rels", PPTX_PRESENTATION_RELS),
        ("ppt/slides/slide1.xml", PPTX_SLIDE_AGENDA),
        ("ppt/slides/slide2.xml", PPTX_SLIDE_TITLE),
    ])
}

/// Operations that paint `text` in 12pt Helvetica with its origin at
/// (`x`, `y`).
pub fn text_at(x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// A PDF whose pages run the given content operations. Pages inherit a
/// Helvetica `F1` and, when `media_box` is set, an A4 media box.
fn pdf_from_operations(pages: Vec<Vec<Operation>>, media_box: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let mut pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
    };
    if media_box {
        pages_dict.set(
            "MediaBox",
            vec![0.into(), 0.into(), 595.into(), 842.into()],
        );
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A PDF with one Helvetica text line per page. An empty string yields a
/// page with no text operators.
pub fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
    let pages = texts
        .iter()
        .map(|text| {
            if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            }
        })
        .collect();
    pdf_from_operations(pages, true)
}

pub const PRICE_LIST_COLUMNS: [i64; 3] = [72, 222, 372];
pub const PRICE_LIST_BASELINES: [i64; 3] = [700, 680, 660];

pub fn price_list_rows() -> Vec<Vec<String>> {
    [["Item", "Qty", "Price"], ["Apple", "3", "1.20"], ["Pear", "10", "0.80"]]
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

fn price_list_cells() -> Vec<Operation> {
    let rows = price_list_rows();
    PRICE_LIST_BASELINES
        .into_iter()
        .zip(&rows)
        .flat_map(|(y, row)| {
            PRICE_LIST_COLUMNS
                .into_iter()
                .zip(row)
                .flat_map(move |(x, cell)| text_at(x, y, cell))
        })
        .collect()
}

/// One page: a heading, a borderless 3x3 price list positioned in columns,
/// and a closing sentence.
pub fn borderless_table_pdf() -> Vec<u8> {
    let mut ops = text_at(72, 760, "Price list");
    ops.extend(price_list_cells());
    ops.extend(text_at(72, 600, "Prices include tax."));
    pdf_from_operations(vec![ops], true)
}

/// Two pages: a cover line, then the price list drawn inside a grid of
/// stroked cell rectangles.
pub fn ruled_table_pdf() -> Vec<u8> {
    let mut grid = Vec::new();
    for y in [695i64, 675, 655] {
        for x in [62i64, 212, 362] {
            grid.push(Operation::new(
                "re",
                vec![x.into(), y.into(), 150.into(), 20.into()],
            ));
        }
    }
    grid.push(Operation::new("S", vec![]));
    grid.extend(price_list_cells());

    pdf_from_operations(vec![text_at(72, 700, "Cover"), grid], true)
}

/// A PDF the text layer cannot handle: no media box anywhere and a string
/// shown before any font is selected.
pub fn malformed_pdf() -> Vec<u8> {
    let ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Td", vec![72.into(), 700.into()]),
        Operation::new("Tj", vec![Object::string_literal("Unreadable")]),
        Operation::new("ET", vec![]),
    ];
    pdf_from_operations(vec![ops], false)
}

/// Canonical 44-byte-header PCM WAV.
pub fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }
    wav
}

// ---------------------------------------------------------------------------
// Scripted engines
// ---------------------------------------------------------------------------

/// Text layer that returns the given pages regardless of input.
pub struct FixedPages(pub Vec<String>);

impl NativeTextExtractor for FixedPages {
    fn extract_pages(&self, _pdf: &[u8]) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

pub struct StaticTables {
    pub flavor: TableFlavor,
    pub tables: Vec<Table>,
}

impl TableDetector for StaticTables {
    fn flavor(&self) -> TableFlavor {
        self.flavor
    }

    fn detect(&self, pdf_path: &Path) -> Result<Vec<Table>> {
        assert!(pdf_path.exists(), "detector must receive a materialized file");
        Ok(self.tables.clone())
    }
}

pub struct FailingDetector(pub TableFlavor);

impl TableDetector for FailingDetector {
    fn flavor(&self) -> TableFlavor {
        self.0
    }

    fn detect(&self, _pdf_path: &Path) -> Result<Vec<Table>> {
        Err(DocfluxError::TableDetection(format!("{} detector failed", self.0)))
    }
}

/// Produces `count` one-byte "images" whose byte is the page index.
pub struct IndexedImages(pub usize);

impl PageRasterizer for IndexedImages {
    fn rasterize(&self, _pdf: &[u8], _dpi: u32, _scratch_dir: &Path) -> Result<Vec<Vec<u8>>> {
        Ok((0..self.0).map(|i| vec![i as u8]).collect())
    }
}

/// Recognizes an [`IndexedImages`] page as `scanned page N`, and records
/// every language hint it receives.
#[derive(Default)]
pub struct PageNumberOcr {
    pub languages: Mutex<Vec<String>>,
}

impl TextRecognizer for PageNumberOcr {
    fn recognize(&self, image: &[u8], languages: &str) -> Result<String> {
        self.languages.lock().unwrap().push(languages.to_string());
        Ok(format!(
            "scanned page {}",
            image.first().copied().unwrap_or(0) + 1
        ))
    }
}

/// Emits `chunk N` for every chunk it is fed, and nothing on flush.
pub struct ChunkCounter {
    seen: usize,
    pending: String,
}

impl StreamingRecognizer for ChunkCounter {
    fn accept_waveform(&mut self, _samples: &[i16]) -> Result<bool> {
        self.seen += 1;
        self.pending = format!("chunk {}", self.seen);
        Ok(true)
    }

    fn result(&mut self) -> Result<String> {
        Ok(std::mem::take(&mut self.pending))
    }

    fn final_result(&mut self) -> Result<String> {
        Ok(String::new())
    }
}

pub struct ChunkCounterFactory;

impl RecognizerFactory for ChunkCounterFactory {
    fn create(&self, _sample_rate: u32) -> Result<Box<dyn StreamingRecognizer>> {
        Ok(Box::new(ChunkCounter {
            seen: 0,
            pending: String::new(),
        }))
    }
}

pub struct NoTranscoder;

impl AudioTranscoder for NoTranscoder {
    fn transcode(&self, _input: &Path, _output: &Path) -> Result<()> {
        Err(DocfluxError::Transcription("transcoding disabled in tests".into()))
    }
}

/// Engines for a PDF whose text layer is `pages`; stream detection finds
/// one table on page 1, OCR reports page numbers, speech is scripted.
pub fn scripted_engines(pages: &[&str]) -> (Engines, Arc<PageNumberOcr>) {
    let ocr = Arc::new(PageNumberOcr::default());
    let recognizer: Arc<dyn TextRecognizer> = ocr.clone();

    let engines = Engines {
        pdf: PdfCapabilities {
            native: Arc::new(FixedPages(pages.iter().map(|p| p.to_string()).collect())),
            stream: Arc::new(StaticTables {
                flavor: TableFlavor::Stream,
                tables: vec![Table::on_page(
                    1,
                    vec![
                        vec!["Item".into(), "Qty".into()],
                        vec!["Bolt".into(), "4".into()],
                    ],
                )],
            }),
            lattice: Arc::new(FailingDetector(TableFlavor::Lattice)),
            rasterizer: Arc::new(IndexedImages(pages.len())),
            recognizer: Arc::clone(&recognizer),
        },
        recognizer,
        speech: SpeechCapabilities {
            backend: SpeechBackend::Available(Arc::new(ChunkCounterFactory)),
            transcoder: Arc::new(NoTranscoder),
        },
    };

    (engines, ocr)
}

// ---------------------------------------------------------------------------
// Package parts
// ---------------------------------------------------------------------------

const XLSX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
    <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
    <Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
    <Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#;

const XLSX_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const XLSX_WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
    <sheets>
        <sheet name="Inventory" sheetId="1" r:id="rId1"/>
        <sheet name="Notes" sheetId="2" r:id="rId2"/>
    </sheets>
</workbook>"#;

const XLSX_WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
    <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

const XLSX_INVENTORY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <sheetData>
        <row r="1">
            <c r="A1" t="s"><v>0</v></c>
            <c r="B1" t="s"><v>1</v></c>
            <c r="C1" t="s"><v>2</v></c>
        </row>
        <row r="2">
            <c r="A2" t="s"><v>3</v></c>
            <c r="B2"><v>100</v></c>
            <c r="C2" t="s"><v>4</v></c>
        </row>
        <row r="3">
            <c r="A3" t="s"><v>5</v></c>
            <c r="B3"><v>2.5</v></c>
            <c r="C3" t="s"><v>6</v></c>
        </row>
    </sheetData>
</worksheet>"#;

const XLSX_NOTES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <sheetData>
        <row r="1">
            <c r="A1" t="inlineStr"><is><t>Reviewed</t></is></c>
            <c r="B1" t="inlineStr"><is><t>yes</t></is></c>
        </row>
    </sheetData>
</worksheet>"#;

const XLSX_SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="7" uniqueCount="7">
    <si><t>Product</t></si>
    <si><t>Price</t></si>
    <si><t>Category</t></si>
    <si><t>Widget A</t></si>
    <si><t>Electronics</t></si>
    <si><t>Widget B</t></si>
    <si><t>Tools</t></si>
</sst>"#;

const PPTX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Default Extension="xml" ContentType="application/xml"/>
    <Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>
    <Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>
    <Override PartName="/ppt/slides/slide2.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>
</Types>"#;

const PPTX_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>
</Relationships>"#;

const PPTX_PRESENTATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
    <p:sldIdLst>
        <p:sldId id="256" r:id="rId2"/>
        <p:sldId id="257" r:id="rId1"/>
    </p:sldIdLst>
</p:presentation>"#;

const PPTX_PRESENTATION_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/>
</Relationships>"#;

const PPTX_SLIDE_TITLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
    <p:cSld>
        <p:spTree>
            <p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
            <p:grpSpPr/>
            <p:sp>
                <p:nvSpPr><p:cNvPr id="2" name="Title"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>
                <p:spPr/>
                <p:txBody><a:bodyPr/><a:p><a:r><a:t>Quarterly Review</a:t></a:r></a:p></p:txBody>
            </p:sp>
        </p:spTree>
    </p:cSld>
</p:sld>"#;

const PPTX_SLIDE_AGENDA: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">
    <p:cSld>
        <p:spTree>
            <p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
            <p:grpSpPr/>
            <p:sp>
                <p:nvSpPr><p:cNvPr id="2" name="Agenda"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>
                <p:spPr/>
                <p:txBody><a:bodyPr/><a:p><a:r><a:t>Revenue &amp; costs</a:t></a:r></a:p><a:p><a:r><a:t>Hiring</a:t></a:r></a:p></p:txBody>
            </p:sp>
        </p:spTree>
    </p:cSld>
</p:sld>"#;
