use serde::{Deserialize, Serialize};

/// Coarse document family a content type resolves to. Each category maps to
/// exactly one extraction strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormatCategory {
    Pdf,
    PowerPoint,
    Word,
    Excel,
    Image,
    Audio,
    Html,
    Text,
}

impl FormatCategory {
    pub const ALL: [FormatCategory; 8] = [
        Self::Pdf,
        Self::PowerPoint,
        Self::Word,
        Self::Excel,
        Self::Image,
        Self::Audio,
        Self::Html,
        Self::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PowerPoint => "powerpoint",
            Self::Word => "word",
            Self::Excel => "excel",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Html => "html",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for FormatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FormatCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "powerpoint" | "pptx" => Ok(Self::PowerPoint),
            "word" | "docx" => Ok(Self::Word),
            "excel" | "xlsx" | "csv" => Ok(Self::Excel),
            "image" => Ok(Self::Image),
            "audio" => Ok(Self::Audio),
            "html" => Ok(Self::Html),
            "text" => Ok(Self::Text),
            _ => Err(format!("Unknown format category: {s}")),
        }
    }
}
