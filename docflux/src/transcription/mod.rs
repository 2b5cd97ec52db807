//! Streaming audio transcription.
//!
//! The engine normalizes an upload into mono PCM (transcoding through
//! `ffmpeg` when the container is not already usable), then feeds fixed-size
//! chunks to a stateful recognizer and collects completed utterances in
//! order. Recognizer and transcoder are injected through
//! [`SpeechCapabilities`], so a missing model is a configuration state
//! rather than a runtime surprise.

mod engine;
mod preprocessing;
mod transcoder;
mod whisper;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::TranscriptionConfig;
use crate::error::Result;

pub use engine::AudioTranscriptionEngine;
pub use preprocessing::{inspect, AudioFormatInfo, AudioPreprocessor, PcmChunkReader};
pub use transcoder::FfmpegTranscoder;
pub use whisper::{is_utterance_boundary, UtteranceSettings, WhisperRecognizerFactory};

/// A stateful recognizer fed one chunk at a time, in stream order.
pub trait StreamingRecognizer: Send {
    /// Returns true when the chunk completed an utterance; the caller then
    /// collects it with [`result`](Self::result).
    fn accept_waveform(&mut self, samples: &[i16]) -> Result<bool>;

    fn result(&mut self) -> Result<String>;

    /// Flushes whatever is still pending once the stream is exhausted.
    fn final_result(&mut self) -> Result<String>;
}

pub trait RecognizerFactory: Send + Sync {
    fn create(&self, sample_rate: u32) -> Result<Box<dyn StreamingRecognizer>>;
}

/// Rewrites `input` as mono 16 kHz PCM WAV at `output`.
pub trait AudioTranscoder: Send + Sync {
    fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

#[derive(Clone)]
pub enum SpeechBackend {
    Available(Arc<dyn RecognizerFactory>),
    Unavailable { reason: String },
}

#[derive(Clone)]
pub struct SpeechCapabilities {
    pub backend: SpeechBackend,
    pub transcoder: Arc<dyn AudioTranscoder>,
}

impl SpeechCapabilities {
    /// Loads the Whisper model when one is configured. Any failure leaves
    /// the backend unavailable instead of aborting startup.
    pub fn from_config(config: &TranscriptionConfig) -> Self {
        let backend = match WhisperRecognizerFactory::new(config) {
            Ok(factory) => {
                info!("Local Whisper backend initialized");
                SpeechBackend::Available(Arc::new(factory))
            }
            Err(e) => {
                let reason = format!("Speech recognition unavailable: {e}");
                warn!("{}", reason);
                SpeechBackend::Unavailable { reason }
            }
        };

        Self {
            backend,
            transcoder: Arc::new(FfmpegTranscoder::new(&config.ffmpeg_path)),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, SpeechBackend::Available(_))
    }
}
