//! Image text recognition.
//!
//! `OcrProvider` wraps Tesseract through leptess and keeps one engine per
//! language hint. Callers that only need recognized text depend on the
//! [`TextRecognizer`] trait, which lets the PDF cascade and the image
//! extractor run against fakes in tests.
//!
//! Tesseract is optional at runtime: when it cannot be initialized the
//! provider reports itself unavailable and every call fails with
//! `OcrUnavailable`.

mod preprocessing;
mod provider;

use crate::error::Result;

pub use preprocessing::{exif_orientation, preprocess_image};
pub use provider::OcrProvider;

/// Turns an encoded image into text using the given `+`-joined language
/// codes (for example `por+eng`).
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &[u8], languages: &str) -> Result<String>;
}
