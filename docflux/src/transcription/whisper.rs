use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext as WhisperRsContext, WhisperContextParameters,
};

use crate::config::TranscriptionConfig;
use crate::error::{DocfluxError, Result};

use super::preprocessing::AudioPreprocessor;
use super::{RecognizerFactory, StreamingRecognizer};

const WHISPER_SAMPLE_RATE: u32 = 16000;

/// When a buffered stretch of audio counts as a finished utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtteranceSettings {
    pub min_secs: f32,
    pub max_secs: f32,
    pub silence_threshold: f32,
}

impl From<&TranscriptionConfig> for UtteranceSettings {
    fn from(config: &TranscriptionConfig) -> Self {
        Self {
            min_secs: config.min_utterance_secs,
            max_secs: config.max_utterance_secs,
            silence_threshold: config.silence_threshold,
        }
    }
}

/// Root mean square of a chunk, normalized to `[0, 1]`.
pub fn chunk_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / 32768.0;
            v * v
        })
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// A boundary falls on a silent chunk once the buffer holds at least
/// `min_secs`, or unconditionally once it reaches `max_secs`.
pub fn is_utterance_boundary(
    buffered_secs: f32,
    chunk_rms: f32,
    settings: &UtteranceSettings,
) -> bool {
    buffered_secs >= settings.max_secs
        || (buffered_secs >= settings.min_secs && chunk_rms < settings.silence_threshold)
}

/// Shared Whisper model; every stream gets its own recognizer state.
pub struct WhisperRecognizerFactory {
    context: Arc<Mutex<WhisperRsContext>>,
    settings: UtteranceSettings,
}

impl WhisperRecognizerFactory {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        let model_path = config.model_path.as_ref().ok_or_else(|| {
            DocfluxError::Transcription(
                "model_path is required for local Whisper backend".to_string(),
            )
        })?;

        info!(model_path = %model_path, "Initializing Whisper context");

        let ctx = WhisperRsContext::new_with_params(model_path, WhisperContextParameters::default())
            .map_err(|e| DocfluxError::Transcription(format!("Failed to load Whisper model: {e}")))?;

        Ok(Self {
            context: Arc::new(Mutex::new(ctx)),
            settings: UtteranceSettings::from(config),
        })
    }
}

impl RecognizerFactory for WhisperRecognizerFactory {
    fn create(&self, sample_rate: u32) -> Result<Box<dyn StreamingRecognizer>> {
        if sample_rate == 0 {
            return Err(DocfluxError::Transcription(
                "Audio stream reports a zero sample rate".to_string(),
            ));
        }
        Ok(Box::new(WhisperStreamingRecognizer {
            context: Arc::clone(&self.context),
            sample_rate,
            settings: self.settings,
            buffer: Vec::new(),
            completed: String::new(),
        }))
    }
}

struct WhisperStreamingRecognizer {
    context: Arc<Mutex<WhisperRsContext>>,
    sample_rate: u32,
    settings: UtteranceSettings,
    buffer: Vec<f32>,
    completed: String,
}

impl WhisperStreamingRecognizer {
    fn flush(&mut self) -> Result<String> {
        let samples = std::mem::take(&mut self.buffer);
        if samples.is_empty() {
            return Ok(String::new());
        }

        let samples = if self.sample_rate == WHISPER_SAMPLE_RATE {
            samples
        } else {
            AudioPreprocessor::resample_to_16khz_mono(samples, self.sample_rate, 1)?
        };
        transcribe(&self.context, &samples)
    }
}

impl StreamingRecognizer for WhisperStreamingRecognizer {
    fn accept_waveform(&mut self, samples: &[i16]) -> Result<bool> {
        self.buffer
            .extend(samples.iter().map(|&s| s as f32 / 32768.0));

        let buffered_secs = self.buffer.len() as f32 / self.sample_rate as f32;
        if !is_utterance_boundary(buffered_secs, chunk_rms(samples), &self.settings) {
            return Ok(false);
        }

        self.completed = self.flush()?;
        Ok(true)
    }

    fn result(&mut self) -> Result<String> {
        Ok(std::mem::take(&mut self.completed))
    }

    fn final_result(&mut self) -> Result<String> {
        self.flush()
    }
}

/// Run Whisper over 16 kHz mono samples in `[-1.0, 1.0]`.
fn transcribe(context: &Mutex<WhisperRsContext>, samples: &[f32]) -> Result<String> {
    debug!(
        sample_count = samples.len(),
        duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32,
        "Transcribing utterance"
    );

    let ctx = context
        .lock()
        .map_err(|_| DocfluxError::Transcription("Whisper context lock poisoned".to_string()))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_print_progress(false);
    params.set_print_realtime(false);

    let mut state = ctx.create_state().map_err(|e| {
        DocfluxError::Transcription(format!("Failed to create Whisper state: {e}"))
    })?;

    state
        .full(params, samples)
        .map_err(|e| DocfluxError::Transcription(format!("Transcription failed: {e}")))?;

    let num_segments = state.full_n_segments();
    if num_segments < 0 {
        return Err(DocfluxError::Transcription(
            "Invalid segment count".to_string(),
        ));
    }

    let mut transcript = String::new();
    for i in 0..num_segments {
        let segment = state
            .get_segment(i)
            .ok_or_else(|| DocfluxError::Transcription(format!("Failed to get segment {i}")))?;
        let text = segment.to_str().map_err(|e| {
            DocfluxError::Transcription(format!("Failed to get text for segment {i}: {e}"))
        })?;
        if !transcript.is_empty() && !transcript.ends_with(' ') {
            transcript.push(' ');
        }
        transcript.push_str(text);
    }

    Ok(transcript.trim().to_string())
}
