use crate::models::FormatCategory;

/// Content-type prefixes per category, checked in this order. The first
/// match wins.
const FORMAT_TABLE: &[(FormatCategory, &[&str])] = &[
    (FormatCategory::Pdf, &["application/pdf"]),
    (
        FormatCategory::PowerPoint,
        &[
            "application/vnd.ms-powerpoint",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ],
    ),
    (
        FormatCategory::Word,
        &[
            "application/msword",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ],
    ),
    (
        FormatCategory::Excel,
        &[
            "application/vnd.ms-excel",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "text/csv",
        ],
    ),
    (
        FormatCategory::Image,
        &[
            "image/jpeg",
            "image/png",
            "image/gif",
            "image/bmp",
            "image/tiff",
            "image/webp",
        ],
    ),
    (
        FormatCategory::Audio,
        &[
            "audio/mpeg",
            "audio/wav",
            "audio/ogg",
            "audio/m4a",
            "audio/mp3",
            "audio/aac",
        ],
    ),
    (FormatCategory::Html, &["text/html"]),
    (
        FormatCategory::Text,
        &["text/plain", "application/json", "application/xml", "text/xml"],
    ),
];

/// Resolve a declared content type to its format category.
///
/// Matching is case-insensitive and prefix-based, so parameters such as
/// `; charset=utf-8` are tolerated. Empty or unknown types yield `None`.
pub fn classify(content_type: &str) -> Option<FormatCategory> {
    let normalized = content_type.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }

    FORMAT_TABLE
        .iter()
        .find(|(_, prefixes)| prefixes.iter().any(|p| normalized.starts_with(p)))
        .map(|(category, _)| *category)
}

/// `(supported, category)` view of [`classify`].
pub fn is_supported(content_type: &str) -> (bool, Option<FormatCategory>) {
    let category = classify(content_type);
    (category.is_some(), category)
}

/// All registered prefixes, in classification order.
pub fn supported_content_types() -> impl Iterator<Item = &'static str> {
    FORMAT_TABLE
        .iter()
        .flat_map(|(_, prefixes)| prefixes.iter().copied())
}
