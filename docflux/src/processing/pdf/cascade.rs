use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{OcrConfig, PdfConfig, UploadConfig};
use crate::error::{DocfluxError, Result};
use crate::models::{Page, StageOutcome, Table, TableFlavor};
use crate::ocr::TextRecognizer;

use super::{
    catch_parser_panic, NativeTextExtractor, PageRasterizer, PdfCapabilities, TableDetector,
};

#[derive(Debug, Clone)]
pub struct CascadeSettings {
    pub dpi: u32,
    pub languages: String,
    pub scratch_dir: PathBuf,
}

impl CascadeSettings {
    pub fn from_config(pdf: &PdfConfig, ocr: &OcrConfig, upload: &UploadConfig) -> Self {
        Self {
            dpi: pdf.raster_dpi,
            languages: ocr.languages.clone(),
            scratch_dir: upload.dir.clone(),
        }
    }
}

/// Tables found by the first flavor that did not error.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTables {
    pub flavor: TableFlavor,
    pub tables: Vec<Table>,
    /// Why `stream` was abandoned, when `lattice` produced the tables.
    pub fallback_reason: Option<String>,
}

/// Why each stage ended the way it did, for logs and assertions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeReport {
    pub native_degraded: Option<String>,
    pub table_flavor: Option<TableFlavor>,
    pub tables_degraded: Option<String>,
    pub looked_like_image: bool,
    pub ocr_attempted: bool,
    pub ocr_degraded: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfExtraction {
    pub pages: Vec<Page>,
    pub tables: Vec<Table>,
    pub ocr: bool,
    pub report: CascadeReport,
}

/// Stage 1: embedded text layer. Any failure degrades to zero pages.
pub fn native_text_stage(extractor: &dyn NativeTextExtractor, pdf: &[u8]) -> StageOutcome<Vec<Page>> {
    match catch_parser_panic(|| extractor.extract_pages(pdf)) {
        Ok(Ok(texts)) => StageOutcome::Ok(Page::from_texts(texts)),
        Ok(Err(e)) => StageOutcome::degraded(e.to_string()),
        Err(panic) => StageOutcome::degraded(format!("Text extraction panicked: {panic}")),
    }
}

fn write_scratch_pdf(pdf: &[u8], scratch_dir: &Path) -> std::io::Result<NamedTempFile> {
    fs::create_dir_all(scratch_dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("tables-")
        .suffix(".pdf")
        .tempfile_in(scratch_dir)?;
    file.write_all(pdf)?;
    file.flush()?;
    Ok(file)
}

/// A detector that panics has failed like any other.
fn run_detector(detector: &dyn TableDetector, path: &Path) -> Result<Vec<Table>> {
    catch_parser_panic(|| detector.detect(path)).unwrap_or_else(|panic| {
        Err(DocfluxError::TableDetection(format!(
            "{} detector panicked: {panic}",
            detector.flavor()
        )))
    })
}

fn detect_with_fallback(
    stream: &dyn TableDetector,
    lattice: &dyn TableDetector,
    path: &Path,
) -> StageOutcome<DetectedTables> {
    let stream_err = match run_detector(stream, path) {
        Ok(tables) => {
            return StageOutcome::Ok(DetectedTables {
                flavor: stream.flavor(),
                tables,
                fallback_reason: None,
            })
        }
        Err(e) => e,
    };

    warn!(
        flavor = %stream.flavor(),
        error = %stream_err,
        "Table detection failed, falling back to {}",
        lattice.flavor()
    );

    match run_detector(lattice, path) {
        Ok(tables) => StageOutcome::Ok(DetectedTables {
            flavor: lattice.flavor(),
            tables,
            fallback_reason: Some(stream_err.to_string()),
        }),
        Err(lattice_err) => StageOutcome::degraded(format!(
            "{}: {stream_err}; {}: {lattice_err}",
            stream.flavor(),
            lattice.flavor()
        )),
    }
}

/// Stage 2: tables, `stream` first and `lattice` on error. The bytes are
/// staged in a uniquely named file under `scratch_dir`, removed before this
/// returns.
pub fn table_stage(
    stream: &dyn TableDetector,
    lattice: &dyn TableDetector,
    pdf: &[u8],
    scratch_dir: &Path,
) -> StageOutcome<DetectedTables> {
    let file = match write_scratch_pdf(pdf, scratch_dir) {
        Ok(file) => file,
        Err(e) => {
            return StageOutcome::degraded(format!("Failed to stage PDF for table detection: {e}"))
        }
    };

    let outcome = detect_with_fallback(stream, lattice, file.path());

    if let Err(e) = file.close() {
        warn!(error = %e, "Failed to remove staged PDF");
    }
    outcome
}

/// A text layer that is missing or at least half blank is treated as a scan.
/// Uses floor division, so a single blank page out of one, two, or three
/// pages already qualifies.
pub fn looks_like_image(pages: &[Page]) -> bool {
    if pages.is_empty() {
        return true;
    }
    let empties = pages.iter().filter(|p| p.is_blank()).count();
    empties >= std::cmp::max(1, pages.len() / 2)
}

/// Stage 3: rasterize every page and recognize it. Any failure degrades the
/// whole stage.
pub fn ocr_stage(
    rasterizer: &dyn PageRasterizer,
    recognizer: &dyn TextRecognizer,
    pdf: &[u8],
    settings: &CascadeSettings,
) -> StageOutcome<Vec<Page>> {
    let images = match rasterizer.rasterize(pdf, settings.dpi, &settings.scratch_dir) {
        Ok(images) => images,
        Err(e) => return StageOutcome::degraded(e.to_string()),
    };

    let mut texts = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        match recognizer.recognize(image, &settings.languages) {
            Ok(text) => texts.push(text.trim().to_string()),
            Err(e) => return StageOutcome::degraded(format!("page {}: {e}", i + 1)),
        }
    }

    StageOutcome::Ok(Page::from_texts(texts))
}

pub struct PdfCascade {
    capabilities: PdfCapabilities,
    settings: CascadeSettings,
}

impl PdfCascade {
    pub fn new(capabilities: PdfCapabilities, settings: CascadeSettings) -> Self {
        Self {
            capabilities,
            settings,
        }
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    fn text_and_tables(&self, pdf: &[u8], report: &mut CascadeReport) -> (Vec<Page>, Vec<Table>) {
        let native = native_text_stage(self.capabilities.native.as_ref(), pdf);
        if let Some(reason) = native.reason() {
            warn!(reason, "Native PDF text unavailable, continuing without it");
            report.native_degraded = Some(reason.to_string());
        }
        let pages = native.value_or(Vec::new());

        let tables = match table_stage(
            self.capabilities.stream.as_ref(),
            self.capabilities.lattice.as_ref(),
            pdf,
            &self.settings.scratch_dir,
        ) {
            StageOutcome::Ok(detected) => {
                report.table_flavor = Some(detected.flavor);
                detected.tables
            }
            StageOutcome::Degraded { reason } => {
                warn!(reason = %reason, "Table detection failed for every flavor");
                report.tables_degraded = Some(reason);
                Vec::new()
            }
        };

        (pages, tables)
    }

    /// Native text and tables only, never OCR.
    pub fn extract_text_and_tables(&self, pdf: &[u8]) -> PdfExtraction {
        let mut report = CascadeReport::default();
        let (pages, tables) = self.text_and_tables(pdf, &mut report);
        PdfExtraction {
            pages,
            tables,
            ocr: false,
            report,
        }
    }

    /// Full cascade. Never fails: every stage degrades to the best result
    /// the earlier stages produced.
    pub fn run(&self, pdf: &[u8], ocr_requested: bool) -> PdfExtraction {
        let mut report = CascadeReport::default();
        let (pages, tables) = self.text_and_tables(pdf, &mut report);

        report.looked_like_image = looks_like_image(&pages);
        debug!(
            pages = pages.len(),
            tables = tables.len(),
            looked_like_image = report.looked_like_image,
            ocr_requested,
            "Native PDF stages finished"
        );

        if !ocr_requested && !report.looked_like_image {
            return PdfExtraction {
                pages,
                tables,
                ocr: false,
                report,
            };
        }

        report.ocr_attempted = true;
        match ocr_stage(
            self.capabilities.rasterizer.as_ref(),
            self.capabilities.recognizer.as_ref(),
            pdf,
            &self.settings,
        ) {
            StageOutcome::Ok(ocr_pages) => {
                info!(
                    pages = ocr_pages.len(),
                    discarded_tables = tables.len(),
                    "PDF text replaced by OCR output"
                );
                PdfExtraction {
                    pages: ocr_pages,
                    tables: Vec::new(),
                    ocr: true,
                    report,
                }
            }
            StageOutcome::Degraded { reason } => {
                warn!(reason = %reason, "OCR failed, keeping native text");
                report.ocr_degraded = Some(reason);
                PdfExtraction {
                    pages,
                    tables,
                    ocr: false,
                    report,
                }
            }
        }
    }
}
