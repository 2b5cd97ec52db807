//! PPTX extractor using zip + quick-xml

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::{DocfluxError, Result};
use crate::models::ExtractionRequest;
use crate::processing::normalizer::ExtractorOutput;

use super::ExtractionStrategy;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// A `# Slide N` line per slide, followed by the text of each shape on it.
pub struct PptxExtractor;

impl PptxExtractor {
    pub fn parse(bytes: &[u8]) -> Result<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DocfluxError::Processing(format!("PPTX parse error: {e}")))?;

        let slide_order = Self::slide_order(&mut archive)?;
        let slide_mapping = Self::slide_mapping(&mut archive)?;

        let mut lines = Vec::new();
        for (index, r_id) in slide_order.iter().enumerate() {
            let slide_number = index + 1;
            lines.push(format!("# Slide {slide_number}"));

            let slide_path = slide_mapping
                .get(r_id)
                .cloned()
                .unwrap_or_else(|| format!("ppt/slides/slide{slide_number}.xml"));

            if let Ok(xml) = Self::read_file(&mut archive, &slide_path) {
                lines.extend(Self::shape_texts(&xml));
            }
        }

        Ok(lines.join("\n"))
    }

    fn slide_order(archive: &mut Archive<'_>) -> Result<Vec<String>> {
        let xml = Self::read_file(archive, "ppt/presentation.xml")?;

        let mut reader = Reader::from_str(&xml);
        reader.config_mut().trim_text(true);

        let mut slide_ids = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"p:sldId" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"r:id" {
                            if let Ok(val) = std::str::from_utf8(&attr.value) {
                                slide_ids.push(val.to_string());
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DocfluxError::Processing(format!(
                        "Error parsing presentation.xml: {e}"
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(slide_ids)
    }

    /// Relationship id to archive path, slides only.
    fn slide_mapping(archive: &mut Archive<'_>) -> Result<HashMap<String, String>> {
        let xml = Self::read_file(archive, "ppt/_rels/presentation.xml.rels")?;

        let mut reader = Reader::from_str(&xml);
        reader.config_mut().trim_text(true);

        let mut mapping = HashMap::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let mut id = None;
                    let mut target = None;
                    let mut rel_type = None;

                    for attr in e.attributes().flatten() {
                        let value = std::str::from_utf8(&attr.value).ok().map(String::from);
                        match attr.key.as_ref() {
                            b"Id" => id = value,
                            b"Target" => target = value,
                            b"Type" => rel_type = value,
                            _ => {}
                        }
                    }

                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/slide") {
                            mapping.insert(id, format!("ppt/{target}"));
                        }
                    }
                }
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(mapping)
    }

    /// Text of every `p:sp` shape in document order, paragraphs joined by
    /// newlines. Shapes without text are skipped.
    fn shape_texts(xml: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);

        let mut shapes = Vec::new();
        let mut paragraphs: Vec<String> = Vec::new();
        let mut paragraph = String::new();
        let mut shape_depth = 0usize;
        let mut in_text = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"p:sp" => shape_depth += 1,
                    b"a:t" => in_text = true,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_text => {
                    paragraph.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
                Ok(Event::GeneralRef(r)) if in_text => {
                    if let Ok(Some(ch)) = r.resolve_char_ref() {
                        paragraph.push(ch);
                    } else if let Some(s) =
                        resolve_predefined_entity(&String::from_utf8_lossy(r.as_ref()))
                    {
                        paragraph.push_str(s);
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"a:t" => in_text = false,
                    b"a:p" if shape_depth > 0 => paragraphs.push(std::mem::take(&mut paragraph)),
                    b"p:sp" => {
                        shape_depth = shape_depth.saturating_sub(1);
                        let text = std::mem::take(&mut paragraphs).join("\n");
                        if !text.trim().is_empty() {
                            shapes.push(text);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
            buf.clear();
        }

        shapes
    }

    fn read_file(archive: &mut Archive<'_>, path: &str) -> Result<String> {
        let mut file = archive.by_name(path).map_err(|e| {
            DocfluxError::Processing(format!("Failed to read {path} from PPTX: {e}"))
        })?;

        let mut content = String::new();
        file.read_to_string(&mut content).map_err(|e| {
            DocfluxError::Processing(format!("Failed to read {path} content: {e}"))
        })?;

        Ok(content)
    }
}

impl ExtractionStrategy for PptxExtractor {
    fn extract(&self, request: &ExtractionRequest, _scratch_dir: &Path) -> Result<ExtractorOutput> {
        Ok(ExtractorOutput::Text {
            content: Self::parse(request.bytes())?,
        })
    }
}
