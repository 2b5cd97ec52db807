use serde::Deserialize;
use std::env;
use std::path::PathBuf;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) if val.trim().is_empty() => None,
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub pdf: PdfConfig,
    pub ocr: OcrConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on request bodies, multipart or raw.
    pub max_body_bytes: usize,
}

/// Scratch space for per-request artifacts. Every file placed here is
/// uniquely named and removed before the request returns.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PdfConfig {
    pub raster_dpi: u32,
    /// Applied when the caller does not pass `ocr`.
    pub default_ocr: bool,
    pub pdftoppm_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language hint, `+`-separated (e.g. `por+eng`).
    pub languages: String,
    pub max_image_dimension: u32,
    pub min_image_dimension: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub model_path: Option<String>,
    pub ffmpeg_path: String,
    pub chunk_frames: usize,
    pub max_file_size: u64,
    pub min_utterance_secs: f32,
    pub max_utterance_secs: f32,
    pub silence_threshold: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7001,
            max_body_bytes: 104857600,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            raster_dpi: 300,
            default_ocr: true,
            pdftoppm_path: "pdftoppm".to_string(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "por+eng".to_string(),
            max_image_dimension: 4096,
            min_image_dimension: 10,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            ffmpeg_path: "ffmpeg".to_string(),
            chunk_frames: 4000,
            max_file_size: 104857600,
            min_utterance_secs: 2.0,
            max_utterance_secs: 30.0,
            silence_threshold: 0.01,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let server = ServerConfig::default();
        let upload = UploadConfig::default();
        let pdf = PdfConfig::default();
        let ocr = OcrConfig::default();
        let transcription = TranscriptionConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("DOCFLUX_HOST").unwrap_or(server.host),
                port: parse_env_or("DOCFLUX_PORT", server.port),
                max_body_bytes: parse_env_or("DOCFLUX_MAX_BODY_BYTES", server.max_body_bytes),
            },
            upload: UploadConfig {
                dir: parse_env_opt("UPLOAD_DIR").unwrap_or(upload.dir),
            },
            pdf: PdfConfig {
                raster_dpi: parse_env_or("PDF_RASTER_DPI", pdf.raster_dpi),
                default_ocr: parse_env_or("PDF_OCR_DEFAULT", pdf.default_ocr),
                pdftoppm_path: env::var("PDFTOPPM_PATH").unwrap_or(pdf.pdftoppm_path),
            },
            ocr: OcrConfig {
                languages: env::var("OCR_LANG")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or(ocr.languages),
                max_image_dimension: parse_env_or("OCR_MAX_DIMENSION", ocr.max_image_dimension),
                min_image_dimension: parse_env_or("OCR_MIN_DIMENSION", ocr.min_image_dimension),
            },
            transcription: TranscriptionConfig {
                model_path: parse_env_opt("SPEECH_MODEL_PATH"),
                ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(transcription.ffmpeg_path),
                chunk_frames: parse_env_or(
                    "TRANSCRIPTION_CHUNK_FRAMES",
                    transcription.chunk_frames,
                ),
                max_file_size: parse_env_or(
                    "TRANSCRIPTION_MAX_FILE_SIZE",
                    transcription.max_file_size,
                ),
                min_utterance_secs: parse_env_or(
                    "TRANSCRIPTION_MIN_UTTERANCE_SECS",
                    transcription.min_utterance_secs,
                ),
                max_utterance_secs: parse_env_or(
                    "TRANSCRIPTION_MAX_UTTERANCE_SECS",
                    transcription.max_utterance_secs,
                ),
                silence_threshold: parse_env_or(
                    "TRANSCRIPTION_SILENCE_THRESHOLD",
                    transcription.silence_threshold,
                ),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
