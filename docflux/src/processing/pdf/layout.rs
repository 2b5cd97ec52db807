//! Positioned text runs and ruling lines read straight from a page's content
//! stream. Table detection needs glyph coordinates, which the flattened text
//! layer throws away.

use std::collections::HashMap;
use std::sync::LazyLock;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use regex::Regex;
use tracing::debug;

use crate::error::{DocfluxError, Result};

/// Width of an average glyph as a fraction of the font size. Font metrics
/// are not loaded, so run widths are estimates.
const AVERAGE_GLYPH_WIDTH: f32 = 0.5;

/// Segments closer than this to axis-aligned count as rulings.
const AXIS_TOLERANCE: f32 = 1.0;

/// Resources are inherited through at most this many `Parent` links.
const MAX_PAGE_TREE_DEPTH: usize = 32;

static CMAP_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([0-9A-Fa-f]*)>|\[|\]|beginbfchar|endbfchar|beginbfrange|endbfrange").unwrap()
});

/// A string painted by one text-showing operator, in device space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub size: f32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ruling {
    Vertical { x: f32, y0: f32, y1: f32 },
    Horizontal { y: f32, x0: f32, x1: f32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub runs: Vec<TextRun>,
    pub rulings: Vec<Ruling>,
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values: Vec<f32> = operands.iter().filter_map(number).collect();
        match values.as_slice() {
            &[a, b, c, d, e, f] => Some(Self { a, b, c, d, e, f }),
            _ => None,
        }
    }

    /// `self` applied first, then `next`.
    fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn horizontal_scale(&self) -> f32 {
        self.a.hypot(self.b)
    }

    fn vertical_scale(&self) -> f32 {
        self.c.hypot(self.d)
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(doc, obj))
}

/// Simple-font strings: UTF-16BE when they carry a byte order mark,
/// otherwise one byte per character.
fn decode_simple(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn hex_bytes(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect()
}

fn hex_code(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex, 16).ok()
}

fn utf16_units(hex: &str) -> Vec<u16> {
    hex_bytes(hex)
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum CMapSection {
    Outside,
    Chars,
    Ranges,
}

/// `bfchar` and `bfrange` entries of a ToUnicode CMap.
fn parse_to_unicode(cmap: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let mut section = CMapSection::Outside;
    let mut operands: Vec<String> = Vec::new();
    let mut array: Option<Vec<String>> = None;

    for token in CMAP_TOKEN.captures_iter(cmap) {
        let Some(whole) = token.get(0) else { continue };
        match whole.as_str() {
            "beginbfchar" => section = CMapSection::Chars,
            "beginbfrange" => section = CMapSection::Ranges,
            "endbfchar" | "endbfrange" => {
                section = CMapSection::Outside;
                operands.clear();
            }
            "[" => array = Some(Vec::new()),
            "]" => {
                let targets = array.take().unwrap_or_default();
                if let (Some(lo), Some(hi)) = (
                    operands.first().and_then(|h| hex_code(h)),
                    operands.get(1).and_then(|h| hex_code(h)),
                ) {
                    for (code, target) in (lo..=hi).zip(targets) {
                        map.insert(code, String::from_utf16_lossy(&utf16_units(&target)));
                    }
                }
                operands.clear();
            }
            _ => {
                let hex = token.get(1).map_or("", |m| m.as_str()).to_string();
                if let Some(items) = array.as_mut() {
                    items.push(hex);
                    continue;
                }
                operands.push(hex);
                match section {
                    CMapSection::Chars if operands.len() == 2 => {
                        if let Some(code) = hex_code(&operands[0]) {
                            map.insert(code, String::from_utf16_lossy(&utf16_units(&operands[1])));
                        }
                        operands.clear();
                    }
                    CMapSection::Ranges if operands.len() == 3 => {
                        if let (Some(lo), Some(hi)) = (hex_code(&operands[0]), hex_code(&operands[1]))
                        {
                            let base = utf16_units(&operands[2]);
                            for (offset, code) in (lo..=hi.min(lo.saturating_add(0xFFFF))).enumerate() {
                                let mut units = base.clone();
                                if let Some(last) = units.last_mut() {
                                    *last = last.wrapping_add(offset as u16);
                                }
                                map.insert(code, String::from_utf16_lossy(&units));
                            }
                        }
                        operands.clear();
                    }
                    CMapSection::Outside => operands.clear(),
                    _ => {}
                }
            }
        }
    }

    map
}

/// Maps string bytes shown in one font to text.
#[derive(Debug, Clone, Default)]
struct FontDecoder {
    two_byte: bool,
    to_unicode: HashMap<u32, String>,
}

impl FontDecoder {
    fn from_font(doc: &Document, font: &Dictionary) -> Self {
        let two_byte = matches!(
            entry(doc, font, b"Subtype"),
            Some(Object::Name(name)) if name.as_slice() == b"Type0"
        );
        let to_unicode = entry(doc, font, b"ToUnicode")
            .and_then(|obj| obj.as_stream().ok())
            .map(|stream| {
                let bytes = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                parse_to_unicode(&String::from_utf8_lossy(&bytes))
            })
            .unwrap_or_default();

        Self {
            two_byte,
            to_unicode,
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if !self.two_byte && self.to_unicode.is_empty() {
            return decode_simple(bytes);
        }
        let width = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(width)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                match self.to_unicode.get(&code) {
                    Some(text) => text.clone(),
                    None if self.two_byte => String::new(),
                    None => chunk.iter().map(|&b| char::from(b)).collect(),
                }
            })
            .collect()
    }
}

/// Fonts from the page's resources, inherited from ancestors when the page
/// has none of its own.
fn page_fonts(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontDecoder> {
    let mut node = doc.get_object(page_id).ok().and_then(|obj| obj.as_dict().ok());

    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let Some(dict) = node else { break };
        let fonts = entry(doc, dict, b"Resources")
            .and_then(|res| res.as_dict().ok())
            .and_then(|res| entry(doc, res, b"Font"))
            .and_then(|fonts| fonts.as_dict().ok());

        if let Some(fonts) = fonts {
            return fonts
                .iter()
                .filter_map(|(name, obj)| {
                    let font = resolve(doc, obj)?.as_dict().ok()?;
                    Some((name.clone(), FontDecoder::from_font(doc, font)))
                })
                .collect();
        }
        node = entry(doc, dict, b"Parent").and_then(|parent| parent.as_dict().ok());
    }

    HashMap::new()
}

/// Tracks the graphics and text state needed to place runs and rulings.
struct Walker<'a> {
    fonts: &'a HashMap<Vec<u8>, FontDecoder>,
    ctm: Matrix,
    saved: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
    font: Option<&'a FontDecoder>,
    font_size: f32,
    cursor: Option<(f32, f32)>,
    layout: PageLayout,
}

impl<'a> Walker<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, FontDecoder>) -> Self {
        Self {
            fonts,
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            leading: 0.0,
            font: None,
            font_size: 12.0,
            cursor: None,
            layout: PageLayout::default(),
        }
    }

    fn step(&mut self, operator: &str, operands: &[Object]) {
        let num = |i: usize| operands.get(i).and_then(number);

        match operator {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.ctm = m.then(&self.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                let fonts = self.fonts;
                self.font = match operands.first() {
                    Some(Object::Name(name)) => fonts.get(name),
                    _ => None,
                };
                if let Some(size) = num(1) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = num(0) {
                    self.leading = leading;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    if operator == "TD" {
                        self.leading = -ty;
                    }
                    self.next_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(0.0, -self.leading),
            "Tj" | "TJ" => self.show(operands.first()),
            "'" => {
                self.next_line(0.0, -self.leading);
                self.show(operands.first());
            }
            "\"" => {
                self.next_line(0.0, -self.leading);
                self.show(operands.get(2));
            }
            "re" => {
                if let (Some(x), Some(y), Some(w), Some(h)) = (num(0), num(1), num(2), num(3)) {
                    self.rectangle(x, y, w, h);
                }
            }
            "m" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    self.cursor = Some((x, y));
                }
            }
            "l" => {
                if let (Some(x), Some(y)) = (num(0), num(1)) {
                    if let Some(from) = self.cursor {
                        self.segment(from, (x, y));
                    }
                    self.cursor = Some((x, y));
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let text = match self.font {
            Some(font) => font.decode(bytes),
            None => decode_simple(bytes),
        };
        text.chars().filter(|c| !c.is_control()).collect()
    }

    fn estimate_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size * AVERAGE_GLYPH_WIDTH
    }

    fn show(&mut self, operand: Option<&Object>) {
        let render = self.tm.then(&self.ctm);
        let mut text = String::new();
        let mut advance = 0.0;

        match operand {
            Some(Object::String(bytes, _)) => {
                text = self.decode(bytes);
                advance = self.estimate_width(&text);
            }
            Some(Object::Array(items)) => {
                for item in items {
                    if let Object::String(bytes, _) = item {
                        let piece = self.decode(bytes);
                        advance += self.estimate_width(&piece);
                        text.push_str(&piece);
                    } else if let Some(adjust) = number(item) {
                        advance -= adjust / 1000.0 * self.font_size;
                        // Large negative kerning is how many producers space words.
                        if adjust < -200.0 && !text.ends_with(' ') {
                            text.push(' ');
                        }
                    }
                }
            }
            _ => return,
        }

        self.tm = Matrix::translate(advance, 0.0).then(&self.tm);

        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let (x, y) = render.apply(0.0, 0.0);
        self.layout.runs.push(TextRun {
            x,
            y,
            width: advance * render.horizontal_scale(),
            size: self.font_size * render.vertical_scale(),
            text: text.to_string(),
        });
    }

    fn rectangle(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let (ax, ay) = self.ctm.apply(x, y);
        let (bx, by) = self.ctm.apply(x + w, y + h);
        let (x0, x1) = (ax.min(bx), ax.max(bx));
        let (y0, y1) = (ay.min(by), ay.max(by));

        self.layout.rulings.extend([
            Ruling::Vertical { x: x0, y0, y1 },
            Ruling::Vertical { x: x1, y0, y1 },
            Ruling::Horizontal { y: y0, x0, x1 },
            Ruling::Horizontal { y: y1, x0, x1 },
        ]);
    }

    fn segment(&mut self, from: (f32, f32), to: (f32, f32)) {
        let (ax, ay) = self.ctm.apply(from.0, from.1);
        let (bx, by) = self.ctm.apply(to.0, to.1);

        if (ax - bx).abs() < AXIS_TOLERANCE {
            self.layout.rulings.push(Ruling::Vertical {
                x: ax,
                y0: ay.min(by),
                y1: ay.max(by),
            });
        } else if (ay - by).abs() < AXIS_TOLERANCE {
            self.layout.rulings.push(Ruling::Horizontal {
                y: ay,
                x0: ax.min(bx),
                x1: ax.max(bx),
            });
        }
    }
}

/// Lay out one page of a loaded document.
pub fn page_layout(doc: &Document, page_id: ObjectId) -> Result<PageLayout> {
    let bytes = doc
        .get_page_content(page_id)
        .map_err(|e| DocfluxError::TableDetection(format!("Failed to read page content: {e}")))?;
    let content = Content::decode(&bytes)
        .map_err(|e| DocfluxError::TableDetection(format!("Failed to decode content stream: {e}")))?;

    let fonts = page_fonts(doc, page_id);
    let mut walker = Walker::new(&fonts);
    for op in &content.operations {
        walker.step(&op.operator, &op.operands);
    }
    Ok(walker.layout)
}

/// Lay out every page that can be decoded, keyed by 1-based page number.
/// Pages with unreadable content streams are skipped.
pub fn document_layout(doc: &Document) -> Vec<(u32, PageLayout)> {
    doc.get_pages()
        .into_iter()
        .filter_map(|(page, page_id)| match page_layout(doc, page_id) {
            Ok(layout) => Some((page, layout)),
            Err(e) => {
                debug!(page, error = %e, "Skipping page without a usable layout");
                None
            }
        })
        .collect()
}
