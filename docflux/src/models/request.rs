use serde::{Deserialize, Deserializer};

/// Caller-controlled knobs for a single conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExtractionOptions {
    /// Force (`true`) or suppress OCR on PDFs. Compared case-insensitively
    /// against `true`; any other value means `false`. Scanned PDFs are
    /// OCR'd regardless.
    #[serde(default, deserialize_with = "deserialize_flag")]
    #[param(value_type = Option<String>)]
    pub ocr: Option<bool>,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|v| v.trim().eq_ignore_ascii_case("true")))
}

/// One uploaded document. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    bytes: Vec<u8>,
    content_type: String,
    options: ExtractionOptions,
}

impl ExtractionRequest {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
        options: ExtractionOptions,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            options,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
