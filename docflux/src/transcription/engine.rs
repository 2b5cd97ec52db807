use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::TranscriptionConfig;
use crate::error::{DocfluxError, Result};
use crate::models::Transcript;

use super::preprocessing::{inspect, PcmChunkReader};
use super::{RecognizerFactory, SpeechBackend, SpeechCapabilities};

pub struct AudioTranscriptionEngine {
    capabilities: SpeechCapabilities,
    config: TranscriptionConfig,
}

impl AudioTranscriptionEngine {
    pub fn new(capabilities: SpeechCapabilities, config: TranscriptionConfig) -> Self {
        Self {
            capabilities,
            config,
        }
    }

    pub fn is_available(&self) -> bool {
        self.capabilities.is_available()
    }

    /// Transcribe an uploaded audio file. Every intermediate lives in
    /// `scratch_dir` under a unique name and is removed before returning,
    /// on success and on error alike.
    pub fn transcribe(&self, audio: &[u8], scratch_dir: &Path) -> Result<Transcript> {
        let factory = match &self.capabilities.backend {
            SpeechBackend::Available(factory) => factory,
            SpeechBackend::Unavailable { reason } => {
                return Err(DocfluxError::TranscriptionUnavailable(reason.clone()))
            }
        };

        if audio.len() as u64 > self.config.max_file_size {
            return Err(DocfluxError::PayloadTooLarge(format!(
                "Audio is {} bytes, limit is {}",
                audio.len(),
                self.config.max_file_size
            )));
        }

        fs::create_dir_all(scratch_dir)?;
        let mut input = tempfile::Builder::new()
            .prefix("audio-")
            .tempfile_in(scratch_dir)?;
        input.write_all(audio)?;
        input.flush()?;

        let converted = self.normalize(input.path(), scratch_dir)?;
        let stream_path = converted
            .as_ref()
            .map(NamedTempFile::path)
            .unwrap_or_else(|| input.path());

        let transcript = self.recognize(factory.as_ref(), stream_path)?;
        info!(
            segments = transcript.segments.len(),
            transcoded = converted.is_some(),
            "Audio transcription finished"
        );
        Ok(transcript)
    }

    /// Returns the transcoded file when one was produced. `None` means the
    /// input is read as-is, either because it is already usable or because
    /// transcoding left nothing behind.
    fn normalize(&self, input: &Path, scratch_dir: &Path) -> Result<Option<NamedTempFile>> {
        match inspect(input) {
            Ok(info) if info.is_directly_usable() => {
                debug!(sample_rate = info.sample_rate, "Audio usable without transcoding");
                return Ok(None);
            }
            Ok(info) => debug!(
                sample_rate = info.sample_rate,
                channels = info.channels,
                is_pcm = info.is_pcm,
                "Audio needs transcoding"
            ),
            Err(e) => debug!(error = %e, "Audio container not readable, transcoding"),
        }

        let converted = tempfile::Builder::new()
            .prefix("audio-")
            .suffix(".conv.wav")
            .tempfile_in(scratch_dir)?;

        if let Err(e) = self
            .capabilities
            .transcoder
            .transcode(input, converted.path())
        {
            warn!(error = %e, "Audio transcoding failed, using the file on disk");
        }

        if fs::metadata(converted.path())?.len() > 0 {
            Ok(Some(converted))
        } else {
            Ok(None)
        }
    }

    fn recognize(&self, factory: &dyn RecognizerFactory, path: &Path) -> Result<Transcript> {
        let mut reader = PcmChunkReader::open(path, self.config.chunk_frames)?;
        let mut recognizer = factory.create(reader.sample_rate())?;

        let mut segments = Vec::new();
        let mut chunks = 0usize;
        while let Some(chunk) = reader.next_chunk()? {
            chunks += 1;
            if recognizer.accept_waveform(&chunk)? {
                segments.push(recognizer.result()?);
            }
        }
        segments.push(recognizer.final_result()?);

        debug!(chunks, sample_rate = reader.sample_rate(), "Recognizer drained");
        Ok(Transcript::from_segments(segments))
    }
}
