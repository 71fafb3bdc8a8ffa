//! Page text layout.
//!
//! Interprets a page's content streams and records every shown character
//! together with its box in user space. The resulting text is what the
//! search runs against, so it is built once per page and never from
//! annotation content.

use crate::fonts::{fonts_in_resources, FontInfo};
use crate::geometry::Matrix;
use crate::objects::{dict_get, inherited, name, number, numbers, resolve, resolve_dict, stream_bytes};
use doc_model::Rect;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

const MAX_FORM_DEPTH: usize = 8;
const DESCENT: f32 = -0.2;
const ASCENT: f32 = 0.8;
/// Horizontal gap, as a fraction of the glyph height, that reads as a space.
const SPACE_GAP: f32 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct LaidChar {
    pub ch: char,
    /// `None` for separators synthesized between runs.
    pub bbox: Option<Rect>,
}

/// Plain text of a page plus the box behind every character.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayout {
    text: String,
    chars: Vec<LaidChar>,
    offsets: Vec<usize>,
}

impl TextLayout {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chars(&self) -> &[LaidChar] {
        &self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Character index of a byte offset that lies on a char boundary.
    pub fn char_index(&self, byte_offset: usize) -> usize {
        self.offsets.partition_point(|offset| *offset < byte_offset)
    }

    fn push(&mut self, ch: char, bbox: Option<Rect>) {
        self.offsets.push(self.text.len());
        self.text.push(ch);
        self.chars.push(LaidChar { ch, bbox });
    }

    fn last_glyph(&self) -> Option<Rect> {
        self.chars.iter().rev().find_map(|c| c.bbox)
    }

    fn ends_with_whitespace(&self) -> bool {
        self.text.chars().next_back().map_or(true, char::is_whitespace)
    }

    fn push_glyph(&mut self, text: &str, bbox: Rect) {
        if text.is_empty() {
            return;
        }

        if let Some(previous) = self.last_glyph() {
            let height = bbox.height().max(previous.height()).max(f32::EPSILON);
            let starts_with_space = text.starts_with(char::is_whitespace);

            if (bbox.center_y() - previous.center_y()).abs() > height / 2.0 {
                if !self.text.ends_with('\n') {
                    self.push('\n', None);
                }
            } else if bbox.x0 - previous.x1 > height * SPACE_GAP
                && !self.ends_with_whitespace()
                && !starts_with_space
            {
                self.push(' ', None);
            }
        }

        for ch in text.chars() {
            self.push(ch, Some(bbox));
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextState {
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
    font: Option<Vec<u8>>,
}

struct Interpreter<'a> {
    doc: &'a Document,
    layout: TextLayout,
}

struct Frame<'a> {
    resources: Option<&'a Dictionary>,
    fonts: HashMap<Vec<u8>, FontInfo>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
}

/// Lay out the text of one page.
pub fn page_layout(doc: &Document, page_id: ObjectId) -> TextLayout {
    let resources = inherited(doc, page_id, b"Resources").and_then(|object| match object {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    });

    let content = page_content(doc, page_id);
    let mut interpreter = Interpreter { doc, layout: TextLayout::default() };
    interpreter.run(&content, resources, Matrix::IDENTITY, 0);
    interpreter.layout
}

fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let Some(contents) = doc.get_dictionary(page_id).ok().and_then(|page| dict_get(doc, page, b"Contents"))
    else {
        return Vec::new();
    };

    let streams: Vec<&Object> = match contents {
        Object::Array(parts) => parts.iter().filter_map(|part| resolve(doc, part)).collect(),
        other => vec![other],
    };

    let mut bytes = Vec::new();
    for stream in streams {
        if let Object::Stream(stream) = stream {
            bytes.extend(stream_bytes(stream));
            bytes.push(b'\n');
        }
    }
    bytes
}

impl<'a> Interpreter<'a> {
    fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>, ctm: Matrix, depth: usize) {
        let operations = match Content::decode(content) {
            Ok(content) => content.operations,
            Err(err) => {
                log::warn!("could not parse content stream: {err}");
                return;
            }
        };

        let mut frame = Frame {
            resources,
            fonts: fonts_in_resources(self.doc, resources),
            state: GraphicsState { ctm, text: TextState::default(), font: None },
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
        };

        for operation in &operations {
            let operands = &operation.operands;
            let nums: Vec<f32> =
                operands.iter().filter_map(|operand| resolve(self.doc, operand).and_then(number)).collect();

            match operation.operator.as_str() {
                "q" => frame.stack.push(frame.state.clone()),
                "Q" => {
                    if let Some(state) = frame.stack.pop() {
                        frame.state = state;
                    }
                }
                "cm" => {
                    if let Some(matrix) = Matrix::from_slice(&nums) {
                        frame.state.ctm = matrix.then(&frame.state.ctm);
                    }
                }
                "BT" => {
                    frame.tm = Matrix::IDENTITY;
                    frame.tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    frame.state.font = operands.first().and_then(name).map(<[u8]>::to_vec);
                    if let Some(size) = nums.first() {
                        frame.state.text.font_size = *size;
                    }
                }
                "Tc" => frame.state.text.char_spacing = nums.first().copied().unwrap_or(0.0),
                "Tw" => frame.state.text.word_spacing = nums.first().copied().unwrap_or(0.0),
                "Tz" => frame.state.text.horizontal_scale = nums.first().copied().unwrap_or(100.0) / 100.0,
                "TL" => frame.state.text.leading = nums.first().copied().unwrap_or(0.0),
                "Ts" => frame.state.text.rise = nums.first().copied().unwrap_or(0.0),
                "Td" => {
                    if let [tx, ty] = nums[..] {
                        frame.next_line(tx, ty);
                    }
                }
                "TD" => {
                    if let [tx, ty] = nums[..] {
                        frame.state.text.leading = -ty;
                        frame.next_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(matrix) = Matrix::from_slice(&nums) {
                        frame.tm = matrix;
                        frame.tlm = matrix;
                    }
                }
                "T*" => frame.next_line(0.0, -frame.state.text.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&mut frame, bytes);
                    }
                }
                "'" => {
                    frame.next_line(0.0, -frame.state.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&mut frame, bytes);
                    }
                }
                "\"" => {
                    if let [word_spacing, char_spacing, ..] = nums[..] {
                        frame.state.text.word_spacing = word_spacing;
                        frame.state.text.char_spacing = char_spacing;
                    }
                    frame.next_line(0.0, -frame.state.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(&mut frame, bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => self.show(&mut frame, bytes),
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let text = frame.state.text;
                                        let tx = -adjust / 1000.0 * text.font_size * text.horizontal_scale;
                                        frame.tm = Matrix::translate(tx, 0.0).then(&frame.tm);
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(xobject) = operands.first().and_then(name) {
                        self.draw_form(&frame, xobject, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn show(&mut self, frame: &mut Frame<'a>, bytes: &[u8]) {
        let glyphs = match frame.state.font.as_ref().and_then(|key| frame.fonts.get(key)) {
            Some(font) => font.decode(bytes),
            None => FontInfo::default().decode(bytes),
        };
        let text = frame.state.text;

        for glyph in glyphs {
            let render = Matrix::new(
                text.font_size * text.horizontal_scale,
                0.0,
                0.0,
                text.font_size,
                0.0,
                text.rise,
            )
            .then(&frame.tm)
            .then(&frame.state.ctm);

            let bbox = render.apply_rect(0.0, DESCENT, glyph.width, ASCENT);
            self.layout.push_glyph(&glyph.text, bbox);

            let spacing = if glyph.is_word_space { text.word_spacing } else { 0.0 };
            let tx = (glyph.width * text.font_size + text.char_spacing + spacing) * text.horizontal_scale;
            frame.tm = Matrix::translate(tx, 0.0).then(&frame.tm);
        }
    }

    fn draw_form(&mut self, frame: &Frame<'a>, xobject: &[u8], depth: usize) {
        if depth >= MAX_FORM_DEPTH {
            log::warn!("form XObject nesting deeper than {MAX_FORM_DEPTH}, skipping");
            return;
        }

        let doc = self.doc;
        let Some(Object::Stream(stream)) = frame
            .resources
            .and_then(|resources| dict_get(doc, resources, b"XObject"))
            .and_then(|xobjects| match xobjects {
                Object::Dictionary(dict) => dict_get(doc, dict, xobject),
                _ => None,
            })
        else {
            return;
        };

        if dict_get(doc, &stream.dict, b"Subtype").and_then(name) != Some(b"Form".as_slice()) {
            return;
        }

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|object| numbers(doc, object))
            .and_then(|values| Matrix::from_slice(&values))
            .unwrap_or_default();
        let resources = stream.dict.get(b"Resources").ok().and_then(|object| resolve_dict(doc, object));

        let content = stream_bytes(stream);
        self.run(&content, resources.or(frame.resources), matrix.then(&frame.state.ctm), depth + 1);
    }
}

impl Frame<'_> {
    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }
}
