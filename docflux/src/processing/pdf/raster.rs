use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{DocfluxError, Result};

use super::PageRasterizer;

/// Renders pages with poppler's `pdftoppm` into a scratch directory that is
/// removed before `rasterize` returns.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: String,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `pdftoppm` zero-pads page numbers to a common width, so a lexical
    /// sort is page order.
    fn collect_pages(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        let mut pages: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "png")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(prefix))
            })
            .collect();
        pages.sort();
        Ok(pages)
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf: &[u8], dpi: u32, scratch_dir: &Path) -> Result<Vec<Vec<u8>>> {
        fs::create_dir_all(scratch_dir)?;
        let workdir = tempfile::Builder::new()
            .prefix("raster-")
            .tempdir_in(scratch_dir)?;

        let input = workdir.path().join("input.pdf");
        fs::write(&input, pdf)?;
        let prefix = workdir.path().join("page");

        let output = Command::new(&self.binary)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(&input)
            .arg(&prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                DocfluxError::Rasterization(format!("Failed to run {}: {e}", self.binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocfluxError::Rasterization(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let images = Self::collect_pages(workdir.path(), "page")?
            .iter()
            .map(fs::read)
            .collect::<std::io::Result<Vec<_>>>()?;

        debug!(pages = images.len(), dpi, "Rasterized PDF");
        Ok(images)
    }
}
