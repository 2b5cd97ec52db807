use std::path::Path;

use crate::error::Result;
use crate::models::ExtractionRequest;
use crate::processing::normalizer::ExtractorOutput;
use crate::transcription::AudioTranscriptionEngine;

use super::ExtractionStrategy;

pub struct AudioStrategy {
    engine: AudioTranscriptionEngine,
}

impl AudioStrategy {
    pub fn new(engine: AudioTranscriptionEngine) -> Self {
        Self { engine }
    }
}

impl ExtractionStrategy for AudioStrategy {
    fn extract(&self, request: &ExtractionRequest, scratch_dir: &Path) -> Result<ExtractorOutput> {
        let transcript = self.engine.transcribe(request.bytes(), scratch_dir)?;
        Ok(ExtractorOutput::Transcript(transcript))
    }
}
