use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use leptess::LepTess;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::error::{DocfluxError, Result};

use super::TextRecognizer;

enum OcrBackend {
    /// One Tesseract instance per language hint, created on first use.
    Local {
        engines: Arc<Mutex<HashMap<String, LepTess>>>,
    },
    Unavailable {
        reason: String,
    },
}

pub struct OcrProvider {
    backend: OcrBackend,
}

fn create_tesseract(languages: &str) -> std::result::Result<LepTess, String> {
    LepTess::new(None, languages).map_err(|e| e.to_string())
}

impl OcrProvider {
    /// Probe Tesseract with the configured languages. A missing engine or
    /// missing traineddata leaves the provider unavailable rather than
    /// failing startup.
    pub fn new(config: &OcrConfig) -> Self {
        let backend = match create_tesseract(&config.languages) {
            Ok(lt) => {
                info!(languages = %config.languages, "Tesseract OCR initialized");
                let mut engines = HashMap::new();
                engines.insert(config.languages.clone(), lt);
                OcrBackend::Local {
                    engines: Arc::new(Mutex::new(engines)),
                }
            }
            Err(e) => {
                let reason = format!("Tesseract not available: {e}");
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
        };

        Self { backend }
    }

    #[cfg(test)]
    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: OcrBackend::Unavailable {
                reason: reason.to_string(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }
}

impl TextRecognizer for OcrProvider {
    fn recognize(&self, image: &[u8], languages: &str) -> Result<String> {
        let engines = match &self.backend {
            OcrBackend::Local { engines } => engines,
            OcrBackend::Unavailable { reason } => {
                return Err(DocfluxError::OcrUnavailable(reason.clone()))
            }
        };

        let mut engines = engines
            .lock()
            .map_err(|_| DocfluxError::Ocr("OCR engine lock poisoned".to_string()))?;

        let engine = match engines.entry(languages.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(languages, "Loading Tesseract languages");
                let lt = create_tesseract(languages).map_err(|e| {
                    DocfluxError::Ocr(format!("Failed to load languages '{languages}': {e}"))
                })?;
                entry.insert(lt)
            }
        };

        engine
            .set_image_from_mem(image)
            .map_err(|e| DocfluxError::Ocr(format!("Failed to set image: {e}")))?;
        let text = engine
            .get_utf8_text()
            .map_err(|e| DocfluxError::Ocr(format!("Failed to extract text: {e}")))?;

        Ok(text.trim().to_string())
    }
}

impl Clone for OcrProvider {
    fn clone(&self) -> Self {
        let backend = match &self.backend {
            OcrBackend::Local { engines } => OcrBackend::Local {
                engines: Arc::clone(engines),
            },
            OcrBackend::Unavailable { reason } => OcrBackend::Unavailable {
                reason: reason.clone(),
            },
        };
        Self { backend }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_construction_never_panics() {
        let provider = OcrProvider::new(&OcrConfig::default());
        let _ = provider.is_available();
    }

    #[test]
    fn test_unavailable_returns_error() {
        let provider = OcrProvider::unavailable("no tessdata");
        assert!(!provider.is_available());

        let result = provider.recognize(&[], "eng");
        assert!(matches!(result, Err(DocfluxError::OcrUnavailable(_))));
    }

    #[test]
    fn test_clone_shares_availability() {
        let provider = OcrProvider::unavailable("missing");
        let cloned = provider.clone();
        assert_eq!(provider.is_available(), cloned.is_available());
        assert!(matches!(
            cloned.recognize(&[], "por+eng"),
            Err(DocfluxError::OcrUnavailable(reason)) if reason == "missing"
        ));
    }
}
