use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{
    CodecType, Decoder, DecoderOptions, CODEC_TYPE_NULL, CODEC_TYPE_PCM_F32LE,
    CODEC_TYPE_PCM_S16BE, CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S24LE, CODEC_TYPE_PCM_S32LE,
    CODEC_TYPE_PCM_U8,
};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::{DocfluxError, Result};

const TARGET_SAMPLE_RATE: u32 = 16000;
const TARGET_CHANNELS: usize = 1;

/// Rates the recognizer accepts without transcoding.
const DIRECT_SAMPLE_RATES: &[u32] = &[16000, 8000];

const PCM_CODECS: &[CodecType] = &[
    CODEC_TYPE_PCM_S16LE,
    CODEC_TYPE_PCM_S16BE,
    CODEC_TYPE_PCM_S24LE,
    CODEC_TYPE_PCM_S32LE,
    CODEC_TYPE_PCM_F32LE,
    CODEC_TYPE_PCM_U8,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormatInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub is_pcm: bool,
}

impl AudioFormatInfo {
    /// Mono PCM at 16 kHz or 8 kHz goes straight to the recognizer.
    pub fn is_directly_usable(&self) -> bool {
        self.is_pcm && self.channels == 1 && DIRECT_SAMPLE_RATES.contains(&self.sample_rate)
    }
}

fn probe(path: &Path) -> Result<(Box<dyn FormatReader>, Track)> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DocfluxError::Transcription(format!("Failed to probe audio format: {e}")))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .cloned()
        .ok_or_else(|| DocfluxError::Transcription("No audio tracks found".to_string()))?;

    Ok((probed.format, track))
}

/// Reads the container header of the audio file at `path`.
pub fn inspect(path: &Path) -> Result<AudioFormatInfo> {
    let (_, track) = probe(path)?;
    let params = &track.codec_params;

    let info = AudioFormatInfo {
        sample_rate: params.sample_rate.unwrap_or(0),
        channels: params.channels.map(|c| c.count()).unwrap_or(0),
        is_pcm: PCM_CODECS.contains(&params.codec),
    };
    debug!(
        sample_rate = info.sample_rate,
        channels = info.channels,
        is_pcm = info.is_pcm,
        "Inspected audio container"
    );
    Ok(info)
}

/// Average interleaved frames down to one channel.
fn downmix(interleaved: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Sequential reader that yields mono 16-bit PCM in fixed-size chunks.
///
/// Every chunk holds exactly `chunk_frames` frames except the last, which
/// holds the remainder.
pub struct PcmChunkReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    chunk_frames: usize,
    pending: VecDeque<i16>,
    exhausted: bool,
}

impl PcmChunkReader {
    pub fn open(path: &Path, chunk_frames: usize) -> Result<Self> {
        let (format, track) = probe(path)?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| DocfluxError::Transcription("Sample rate not available".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DocfluxError::Transcription(format!("Failed to create decoder: {e}")))?;

        Ok(Self {
            format,
            decoder,
            track_id: track.id,
            sample_rate,
            chunk_frames: chunk_frames.max(1),
            pending: VecDeque::new(),
            exhausted: false,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// `Ok(None)` once the stream is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<i16>>> {
        while self.pending.len() < self.chunk_frames && !self.exhausted {
            self.fill()?;
        }

        if self.pending.is_empty() {
            return Ok(None);
        }
        let take = self.chunk_frames.min(self.pending.len());
        Ok(Some(self.pending.drain(..take).collect()))
    }

    fn fill(&mut self) -> Result<()> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.exhausted = true;
                return Ok(());
            }
            Err(e) => {
                return Err(DocfluxError::Transcription(format!(
                    "Failed to read packet: {e}"
                )));
            }
        };

        if packet.track_id() != self.track_id {
            return Ok(());
        }

        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                self.pending
                    .extend(downmix(buffer.samples(), spec.channels.count()));
            }
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Decode error (skipping): {}", e);
            }
            Err(e) => {
                return Err(DocfluxError::Transcription(format!(
                    "Failed to decode audio: {e}"
                )));
            }
        }
        Ok(())
    }
}

/// Sample-rate and channel conversion for recognizer input.
pub struct AudioPreprocessor;

impl AudioPreprocessor {
    /// Convert stereo (or multi-channel) to mono by averaging channels
    pub fn to_mono(samples: Vec<f32>, channels: usize) -> Vec<f32> {
        if channels <= 1 {
            return samples;
        }

        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }

    /// Resample audio to 16kHz mono PCM
    pub fn resample_to_16khz_mono(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: usize,
    ) -> Result<Vec<f32>> {
        if samples.is_empty() {
            return Err(DocfluxError::Transcription(
                "Empty samples for resampling".to_string(),
            ));
        }

        let mono_samples = Self::to_mono(samples, channels);

        if sample_rate == TARGET_SAMPLE_RATE {
            return Ok(mono_samples);
        }

        debug!(
            from = sample_rate,
            to = TARGET_SAMPLE_RATE,
            "Resampling audio"
        );

        let chunk_size = 1024.min(mono_samples.len());

        let mut resampler = FftFixedIn::<f32>::new(
            sample_rate as usize,
            TARGET_SAMPLE_RATE as usize,
            chunk_size,
            2,
            TARGET_CHANNELS,
        )
        .map_err(|e| DocfluxError::Transcription(format!("Failed to create resampler: {e}")))?;

        let mut output_samples = Vec::new();
        let mut pos = 0;

        while pos < mono_samples.len() {
            let end = (pos + chunk_size).min(mono_samples.len());
            let chunk = &mono_samples[pos..end];

            let output = if end - pos == chunk_size {
                resampler
                    .process(&[chunk.to_vec()], None)
                    .map_err(|e| DocfluxError::Transcription(format!("Resampling failed: {e}")))?
            } else {
                // Pad the tail to a full chunk, then trim the padding back off.
                let mut padded = vec![0.0; chunk_size];
                padded[..chunk.len()].copy_from_slice(chunk);
                let mut result = resampler
                    .process(&[padded], None)
                    .map_err(|e| DocfluxError::Transcription(format!("Resampling failed: {e}")))?;

                let expected_out = ((chunk.len() as f32 / sample_rate as f32)
                    * TARGET_SAMPLE_RATE as f32) as usize;
                result[0].truncate(expected_out);
                result
            };

            output_samples.extend_from_slice(&output[0]);
            pos = end;
        }

        Ok(output_samples)
    }
}

/// Canonical 16-bit PCM WAV bytes for fixtures.
#[cfg(test)]
pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;

    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        wav.extend_from_slice(&s.to_le_bytes());
    }
    wav
}
