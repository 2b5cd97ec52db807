use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{DocfluxError, Result};

use super::AudioTranscoder;

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl AudioTranscoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        debug!(input = %input.display(), output = %output.display(), "Transcoding audio");

        let status = Command::new(&self.binary)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-ac", "1", "-ar", "16000", "-f", "wav"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| DocfluxError::Transcription(format!("Failed to run {}: {e}", self.binary)))?;

        if !status.success() {
            return Err(DocfluxError::Transcription(format!(
                "{} exited with {status}",
                self.binary
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new("/nonexistent/bin/ffmpeg");

        let result = transcoder.transcode(&dir.path().join("in"), &dir.path().join("out.wav"));
        assert!(matches!(result, Err(DocfluxError::Transcription(_))));
    }
}
