use crate::cmap::{capped_end, ToUnicode};
use crate::encoding::SimpleEncoding;
use crate::objects::{dict_get, name, number, numbers, resolve, resolve_dict, stream_bytes};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// One decoded character code of a show-text operand.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    pub text: String,
    /// Advance in text space units (glyph width / 1000).
    pub width: f32,
    /// Single-byte code 32, which receives word spacing.
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple { first_char: u32, widths: Vec<f32>, missing: f32 },
    Cid { widths: HashMap<u32, f32>, default: f32 },
}

/// Metrics and decoding for one font resource.
#[derive(Debug, Clone)]
pub struct FontInfo {
    widths: Widths,
    to_unicode: Option<ToUnicode>,
    encoding: Option<SimpleEncoding>,
    code_bytes: usize,
    fallback_width: f32,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            widths: Widths::Simple { first_char: 0, widths: Vec::new(), missing: 0.0 },
            to_unicode: None,
            encoding: None,
            code_bytes: 1,
            fallback_width: 500.0,
        }
    }
}

impl FontInfo {
    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let subtype = dict_get(doc, font, b"Subtype").and_then(name).unwrap_or_default();
        let base_font = dict_get(doc, font, b"BaseFont").and_then(name).unwrap_or_default();
        let fallback_width = standard_width(base_font);

        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| match object {
                Object::Stream(stream) => Some(ToUnicode::parse(&stream_bytes(stream))),
                _ => None,
            })
            .filter(|cmap| !cmap.is_empty());

        if subtype == b"Type0" {
            let descendant = dict_get(doc, font, b"DescendantFonts").and_then(|object| match object {
                Object::Array(items) => items.first().and_then(|first| resolve_dict(doc, first)),
                _ => None,
            });
            let default = descendant
                .and_then(|cid| dict_get(doc, cid, b"DW"))
                .and_then(number)
                .unwrap_or(1000.0);
            let widths = descendant
                .and_then(|cid| dict_get(doc, cid, b"W"))
                .map(|w| parse_cid_widths(doc, w))
                .unwrap_or_default();
            let code_bytes = to_unicode.as_ref().map_or(2, ToUnicode::code_bytes);

            return Self {
                widths: Widths::Cid { widths, default },
                to_unicode,
                encoding: None,
                code_bytes,
                fallback_width: default,
            };
        }

        let first_char = dict_get(doc, font, b"FirstChar").and_then(number).unwrap_or(0.0) as u32;
        let widths = font.get(b"Widths").ok().and_then(|w| numbers(doc, w)).unwrap_or_default();
        let missing = dict_get(doc, font, b"FontDescriptor")
            .and_then(|object| match object {
                Object::Dictionary(descriptor) => dict_get(doc, descriptor, b"MissingWidth"),
                _ => None,
            })
            .and_then(number)
            .unwrap_or(0.0);

        let encoding = font.get(b"Encoding").ok().and_then(|entry| SimpleEncoding::from_font_entry(doc, entry));

        Self {
            widths: Widths::Simple { first_char, widths, missing },
            to_unicode,
            encoding,
            code_bytes: 1,
            fallback_width,
        }
    }

    fn width_of(&self, code: u32) -> f32 {
        let width = match &self.widths {
            Widths::Simple { first_char, widths, missing } => code
                .checked_sub(*first_char)
                .and_then(|index| widths.get(index as usize).copied())
                .unwrap_or(*missing),
            Widths::Cid { widths, default } => widths.get(&code).copied().unwrap_or(*default),
        };

        if width > 0.0 {
            width / 1000.0
        } else {
            self.fallback_width / 1000.0
        }
    }

    fn text_of(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|cmap| cmap.lookup(code)) {
            return text.to_owned();
        }
        if let Some(encoding) = &self.encoding {
            return encoding.decode(code).map(String::from).unwrap_or_default();
        }
        char::from_u32(code).filter(|c| !c.is_control()).map(String::from).unwrap_or_default()
    }

    /// Split a show-text operand into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        bytes
            .chunks(self.code_bytes.max(1))
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte));
                DecodedGlyph {
                    text: self.text_of(code),
                    width: self.width_of(code),
                    is_word_space: self.code_bytes == 1 && code == 32,
                }
            })
            .collect()
    }
}

fn parse_cid_widths(doc: &Document, object: &Object) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let Object::Array(items) = object else {
        return widths;
    };

    let items: Vec<&Object> = items.iter().filter_map(|item| resolve(doc, item)).collect();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(items[i]) else {
            break;
        };
        match items.get(i + 1) {
            Some(Object::Array(run)) => {
                let first = first as u32;
                for (offset, width) in run.iter().filter_map(number).enumerate() {
                    let Some(code) = u32::try_from(offset).ok().and_then(|offset| first.checked_add(offset)) else {
                        break;
                    };
                    widths.insert(code, width);
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) =
                    (number(last), items.get(i + 2).and_then(|w| number(w)))
                else {
                    break;
                };
                let first = first as u32;
                for code in first..=capped_end(first, last as u32) {
                    widths.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }

    widths
}

/// Approximate advance for the unembedded standard 14 fonts, which often omit `/Widths`.
fn standard_width(base_font: &[u8]) -> f32 {
    let base_font = String::from_utf8_lossy(base_font);
    if base_font.contains("Courier") {
        600.0
    } else if base_font.contains("Helvetica") || base_font.contains("Arial") {
        556.0
    } else {
        500.0
    }
}

/// Fonts declared in a `/Resources` dictionary, keyed by resource name.
pub fn fonts_in_resources(doc: &Document, resources: Option<&Dictionary>) -> HashMap<Vec<u8>, FontInfo> {
    let mut fonts = HashMap::new();
    let Some(font_dict) = resources
        .and_then(|resources| dict_get(doc, resources, b"Font"))
        .and_then(|object| match object {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        })
    else {
        return fonts;
    };

    for (key, value) in font_dict.iter() {
        match resolve_dict(doc, value) {
            Some(font) => {
                fonts.insert(key.clone(), FontInfo::from_dict(doc, font));
            }
            None => log::warn!("font resource /{} is not a dictionary", String::from_utf8_lossy(key)),
        }
    }

    fonts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmap::MAX_RANGE_ENTRIES;
    use lopdf::dictionary;

    #[test]
    fn simple_font_uses_widths_array() {
        let doc = Document::with_version("1.7");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "FirstChar" => 48,
            "Widths" => vec![Object::Integer(600), Object::Integer(400)],
        };
        let info = FontInfo::from_dict(&doc, &font);
        let glyphs = info.decode(b"01");

        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].text, "0");
        assert!((glyphs[0].width - 0.6).abs() < 1e-6);
        assert!((glyphs[1].width - 0.4).abs() < 1e-6);
    }

    #[test]
    fn differences_decode_reencoded_subset_font() {
        let doc = Document::with_version("1.7");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "ABCDEF+Helvetica",
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "Differences" => vec![1.into(), "one".into(), "two".into()],
            },
        };
        let glyphs = FontInfo::from_dict(&doc, &font).decode(&[1, 2, 1]);

        let text: String = glyphs.iter().map(|glyph| glyph.text.as_str()).collect();
        assert_eq!(text, "121");
    }

    #[test]
    fn to_unicode_wins_over_encoding() {
        let mut doc = Document::with_version("1.7");
        let cmap = lopdf::Stream::new(lopdf::Dictionary::new(), b"1 beginbfchar <01> <0039> endbfchar".to_vec());
        let cmap_id = doc.add_object(cmap);
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "Encoding" => dictionary! { "Differences" => vec![1.into(), "one".into()] },
            "ToUnicode" => cmap_id,
        };

        assert_eq!(FontInfo::from_dict(&doc, &font).decode(&[1])[0].text, "9");
    }

    #[test]
    fn standard_font_without_widths_falls_back() {
        let doc = Document::with_version("1.7");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        };
        let glyphs = FontInfo::from_dict(&doc, &font).decode(b"7 ");

        assert!((glyphs[0].width - 0.6).abs() < 1e-6);
        assert!(glyphs[1].is_word_space);
    }

    #[test]
    fn cid_widths_accept_both_forms() {
        let doc = Document::with_version("1.7");
        let w = Object::Array(vec![
            Object::Integer(1),
            Object::Array(vec![Object::Integer(250), Object::Integer(300)]),
            Object::Integer(10),
            Object::Integer(12),
            Object::Integer(700),
        ]);
        let widths = parse_cid_widths(&doc, &w);

        assert_eq!(widths.get(&1), Some(&250.0));
        assert_eq!(widths.get(&2), Some(&300.0));
        assert_eq!(widths.get(&11), Some(&700.0));
        assert_eq!(widths.get(&13), None);
    }

    #[test]
    fn cid_width_ranges_are_bounded() {
        let doc = Document::with_version("1.7");
        let w = Object::Array(vec![
            Object::Integer(0),
            Object::Integer(i64::from(u32::MAX)),
            Object::Integer(500),
            Object::Integer(i64::from(u32::MAX)),
            Object::Array(vec![Object::Integer(250), Object::Integer(300)]),
        ]);
        let widths = parse_cid_widths(&doc, &w);

        assert_eq!(widths.len(), MAX_RANGE_ENTRIES as usize + 1);
        assert_eq!(widths.get(&0), Some(&500.0));
        assert_eq!(widths.get(&MAX_RANGE_ENTRIES), None);
        assert_eq!(widths.get(&u32::MAX), Some(&250.0));
    }
}
