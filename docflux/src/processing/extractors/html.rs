use std::path::Path;

use scraper::Html;

use crate::error::Result;
use crate::models::ExtractionRequest;
use crate::processing::normalizer::ExtractorOutput;

use super::ExtractionStrategy;

/// Elements whose text never reaches the output.
const DROPPED_ELEMENTS: &[&str] = &["script", "style"];

pub struct HtmlExtractor;

impl HtmlExtractor {
    /// Every text node outside `script`/`style`, one per line, with lines
    /// trimmed and blank lines removed.
    pub fn parse(html: &str) -> String {
        let document = Html::parse_document(html);

        let mut text = String::new();
        for node in document.root_element().descendants() {
            let Some(text_node) = node.value().as_text() else {
                continue;
            };
            let dropped = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| DROPPED_ELEMENTS.contains(&el.name()))
            });
            if dropped {
                continue;
            }
            text.push_str(text_node);
            text.push('\n');
        }

        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl ExtractionStrategy for HtmlExtractor {
    fn extract(&self, request: &ExtractionRequest, _scratch_dir: &Path) -> Result<ExtractorOutput> {
        let html = String::from_utf8_lossy(request.bytes());
        Ok(ExtractorOutput::Text {
            content: Self::parse(&html),
        })
    }
}
