//! PDF cascade: native text, then table detection with a flavor fallback,
//! then an OCR pass when the text layer looks like a scan.
//!
//! Every engine is reached through a narrow trait so the cascade can run
//! against fakes in tests and against `pdf-extract`, `lopdf`, `pdftoppm`,
//! and Tesseract in production.

mod cascade;
mod layout;
mod native;
mod raster;
mod tables;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Table, TableFlavor};
use crate::ocr::TextRecognizer;

pub use cascade::{
    looks_like_image, native_text_stage, ocr_stage, table_stage, CascadeReport, CascadeSettings,
    DetectedTables, PdfCascade, PdfExtraction,
};
pub use layout::{document_layout, page_layout, PageLayout, Ruling, TextRun};
pub use native::PdfTextLayer;
pub use raster::PdftoppmRasterizer;
pub use tables::{layout_rows, LatticeDetector, LayoutRow, StreamDetector};

/// PDF parsers index and unwrap their way through malformed input. Run one
/// and turn a panic into the panic message.
pub(crate) fn catch_parser_panic<T>(parse: impl FnOnce() -> T) -> std::result::Result<T, String> {
    catch_unwind(AssertUnwindSafe(parse)).map_err(|payload| panic_message(&*payload))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Reads the embedded text layer, one string per page.
pub trait NativeTextExtractor: Send + Sync {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>>;
}

/// Finds tables in a PDF on disk. Detectors work from a file path, so the
/// cascade materializes the bytes before calling them.
pub trait TableDetector: Send + Sync {
    fn flavor(&self) -> TableFlavor;
    fn detect(&self, pdf_path: &Path) -> Result<Vec<Table>>;
}

/// Renders every page to an encoded image, in page order.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8], dpi: u32, scratch_dir: &Path) -> Result<Vec<Vec<u8>>>;
}

/// Engines the cascade depends on, injected at construction.
#[derive(Clone)]
pub struct PdfCapabilities {
    pub native: Arc<dyn NativeTextExtractor>,
    pub stream: Arc<dyn TableDetector>,
    pub lattice: Arc<dyn TableDetector>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub recognizer: Arc<dyn TextRecognizer>,
}

impl PdfCapabilities {
    /// Production wiring: pdf-extract text layer, text/ruling table
    /// detectors, and the given rasterizer binary plus OCR engine.
    pub fn local(pdftoppm_path: &str, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            native: Arc::new(PdfTextLayer),
            stream: Arc::new(StreamDetector::default()),
            lattice: Arc::new(LatticeDetector::default()),
            rasterizer: Arc::new(PdftoppmRasterizer::new(pdftoppm_path)),
            recognizer,
        }
    }
}
