use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::models::FormatCategory;
use crate::ocr::{OcrProvider, TextRecognizer};
use crate::transcription::{AudioTranscriptionEngine, SpeechCapabilities};

use super::extractors::{
    AudioStrategy, DocxExtractor, ExtractionStrategy, HtmlExtractor, ImageStrategy, PdfStrategy,
    PptxExtractor, SpreadsheetStrategy, TextExtractor,
};
use super::pdf::{CascadeSettings, PdfCapabilities, PdfCascade};

/// Engines shared by the strategies that need them.
#[derive(Clone)]
pub struct Engines {
    pub pdf: PdfCapabilities,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub speech: SpeechCapabilities,
}

impl Engines {
    /// Production wiring: Tesseract, `pdftoppm`, Whisper and `ffmpeg`.
    /// Missing engines are reported and left unavailable.
    pub fn from_config(config: &Config) -> Self {
        let ocr = OcrProvider::new(&config.ocr);
        let ocr_available = ocr.is_available();
        let recognizer: Arc<dyn TextRecognizer> = Arc::new(ocr);
        let speech = SpeechCapabilities::from_config(&config.transcription);

        info!(
            ocr_available,
            speech_available = speech.is_available(),
            "Extraction engines ready"
        );

        Self {
            pdf: PdfCapabilities::local(&config.pdf.pdftoppm_path, Arc::clone(&recognizer)),
            recognizer,
            speech,
        }
    }
}

/// Routes each format category to its extraction strategy.
/// Owns one instance per strategy and hands out trait object references.
pub struct ExtractorRegistry {
    pdf: PdfStrategy,
    powerpoint: PptxExtractor,
    word: DocxExtractor,
    excel: SpreadsheetStrategy,
    image: ImageStrategy,
    audio: AudioStrategy,
    html: HtmlExtractor,
    text: TextExtractor,
}

impl ExtractorRegistry {
    pub fn new(config: &Config, engines: Engines) -> Self {
        let settings = CascadeSettings::from_config(&config.pdf, &config.ocr, &config.upload);
        let cascade = PdfCascade::new(engines.pdf, settings);
        let transcriber =
            AudioTranscriptionEngine::new(engines.speech, config.transcription.clone());

        Self {
            pdf: PdfStrategy::new(cascade, config.pdf.default_ocr),
            powerpoint: PptxExtractor,
            word: DocxExtractor,
            excel: SpreadsheetStrategy,
            image: ImageStrategy::new(engines.recognizer, config.ocr.clone()),
            audio: AudioStrategy::new(transcriber),
            html: HtmlExtractor,
            text: TextExtractor,
        }
    }

    pub fn get(&self, format: FormatCategory) -> &dyn ExtractionStrategy {
        match format {
            FormatCategory::Pdf => &self.pdf,
            FormatCategory::PowerPoint => &self.powerpoint,
            FormatCategory::Word => &self.word,
            FormatCategory::Excel => &self.excel,
            FormatCategory::Image => &self.image,
            FormatCategory::Audio => &self.audio,
            FormatCategory::Html => &self.html,
            FormatCategory::Text => &self.text,
        }
    }

    /// The PDF strategy, for callers that drive the cascade directly.
    pub fn pdf(&self) -> &PdfStrategy {
        &self.pdf
    }
}
