//! Single-byte encodings of simple fonts: the standard base encodings plus
//! `/Differences` resolved through glyph names.

use crate::objects::{dict_get, name, resolve};
use lopdf::{Document, Object};

/// Code to character table for a simple font.
#[derive(Debug, Clone)]
pub struct SimpleEncoding {
    table: [Option<char>; 256],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
}

impl BaseEncoding {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"StandardEncoding" => Some(Self::Standard),
            b"WinAnsiEncoding" => Some(Self::WinAnsi),
            b"MacRomanEncoding" => Some(Self::MacRoman),
            _ => None,
        }
    }

    fn decode(self, code: u8) -> Option<char> {
        match (self, code) {
            (_, 0x00..=0x1f) | (_, 0x7f) => None,
            (Self::Standard, 0x27) => Some('\u{2019}'),
            (Self::Standard, 0x60) => Some('\u{2018}'),
            (_, 0x20..=0x7e) => Some(char::from(code)),
            (Self::Standard, _) => lookup_pair(STANDARD_HIGH, code),
            (Self::WinAnsi, 0x80..=0x9f) => lookup_pair(WIN_ANSI_CONTROL_RANGE, code),
            (Self::WinAnsi, _) => Some(char::from(code)),
            (Self::MacRoman, _) => {
                char::from_u32(u32::from(MAC_ROMAN_HIGH[usize::from(code - 0x80)])).filter(|ch| *ch != '\0')
            }
        }
    }
}

impl SimpleEncoding {
    fn from_base(base: BaseEncoding) -> Self {
        let mut table = [None; 256];
        for (code, slot) in table.iter_mut().enumerate() {
            *slot = base.decode(code as u8);
        }
        Self { table }
    }

    /// Reads a font's `/Encoding`, either a base encoding name or a dictionary
    /// with `/BaseEncoding` and `/Differences`.
    ///
    /// Returns `None` when the font declares no encoding this module understands.
    pub fn from_font_entry(doc: &Document, encoding: &Object) -> Option<Self> {
        match resolve(doc, encoding)? {
            Object::Name(base) => BaseEncoding::from_name(base).map(Self::from_base),
            Object::Dictionary(dict) => {
                // A dictionary without /BaseEncoding starts from StandardEncoding.
                let base = dict_get(doc, dict, b"BaseEncoding")
                    .and_then(name)
                    .and_then(BaseEncoding::from_name)
                    .unwrap_or(BaseEncoding::Standard);
                let mut encoding = Self::from_base(base);
                if let Some(Object::Array(differences)) = dict_get(doc, dict, b"Differences") {
                    encoding.apply_differences(doc, differences);
                }
                Some(encoding)
            }
            _ => None,
        }
    }

    fn apply_differences(&mut self, doc: &Document, differences: &[Object]) {
        let mut code: Option<usize> = None;
        for item in differences.iter().filter_map(|item| resolve(doc, item)) {
            match item {
                Object::Integer(start) => code = usize::try_from(*start).ok(),
                Object::Name(glyph) => {
                    if let Some(current) = code.filter(|current| *current < self.table.len()) {
                        match glyph_to_char(&String::from_utf8_lossy(glyph)) {
                            Some(ch) => self.table[current] = Some(ch),
                            None => log::debug!("unknown glyph name /{}", String::from_utf8_lossy(glyph)),
                        }
                    }
                    code = code.map(|current| current + 1);
                }
                _ => {}
            }
        }
    }

    pub fn decode(&self, code: u32) -> Option<char> {
        self.table.get(code as usize).copied().flatten()
    }
}

fn lookup_pair(pairs: &[(u8, u16)], code: u8) -> Option<char> {
    pairs
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .and_then(|(_, unicode)| char::from_u32(u32::from(*unicode)))
}

/// Glyph name to character, following the Adobe glyph naming convention:
/// a suffix after `.` is ignored, `_` joins ligature components, and
/// `uniXXXX` / `uXXXX` spell code points directly.
fn glyph_to_char(glyph: &str) -> Option<char> {
    let base = glyph.split('.').next().unwrap_or(glyph);
    // Ligatures map to several characters; only single-character names fit a byte slot.
    if base.contains('_') {
        return None;
    }

    if let Some(ch) = named_glyph(base) {
        return Some(ch);
    }
    if let Some(hex) = base.strip_prefix("uni").filter(|hex| hex.len() == 4) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(hex) = base.strip_prefix('u').filter(|hex| (4..=6).contains(&hex.len())) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }

    None
}

fn named_glyph(glyph: &str) -> Option<char> {
    let mut chars = glyph.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphabetic() {
            return Some(ch);
        }
    }

    let ch = match glyph {
        "space" | "nbspace" | "nonbreakingspace" => ' ',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "asciicircum" => '^',
        "underscore" => '_',
        "grave" => '`',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "asciitilde" => '~',
        "quoteleft" => '\u{2018}',
        "quoteright" => '\u{2019}',
        "quotedblleft" => '\u{201c}',
        "quotedblright" => '\u{201d}',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "bullet" => '\u{2022}',
        "ellipsis" => '\u{2026}',
        "degree" => '\u{b0}',
        "section" => '\u{a7}',
        "paragraph" => '\u{b6}',
        "copyright" => '\u{a9}',
        "registered" => '\u{ae}',
        "trademark" => '\u{2122}',
        "sterling" => '\u{a3}',
        "yen" => '\u{a5}',
        "cent" => '\u{a2}',
        "Euro" => '\u{20ac}',
        "rupee" | "rupeeindian" => '\u{20b9}',
        _ => return None,
    };
    Some(ch)
}

/// StandardEncoding codes above 0x7e that carry a glyph.
const STANDARD_HIGH: &[(u8, u16)] = &[
    (0xa1, 0x00a1),
    (0xa2, 0x00a2),
    (0xa3, 0x00a3),
    (0xa4, 0x2044),
    (0xa5, 0x00a5),
    (0xa6, 0x0192),
    (0xa7, 0x00a7),
    (0xa8, 0x00a4),
    (0xa9, 0x0027),
    (0xaa, 0x201c),
    (0xab, 0x00ab),
    (0xac, 0x2039),
    (0xad, 0x203a),
    (0xae, 0xfb01),
    (0xaf, 0xfb02),
    (0xb1, 0x2013),
    (0xb2, 0x2020),
    (0xb3, 0x2021),
    (0xb4, 0x00b7),
    (0xb6, 0x00b6),
    (0xb7, 0x2022),
    (0xb8, 0x201a),
    (0xb9, 0x201e),
    (0xba, 0x201d),
    (0xbb, 0x00bb),
    (0xbc, 0x2026),
    (0xbd, 0x2030),
    (0xbf, 0x00bf),
    (0xc1, 0x0060),
    (0xc2, 0x00b4),
    (0xc3, 0x02c6),
    (0xc4, 0x02dc),
    (0xc5, 0x00af),
    (0xc6, 0x02d8),
    (0xc7, 0x02d9),
    (0xc8, 0x00a8),
    (0xca, 0x02da),
    (0xcb, 0x00b8),
    (0xcd, 0x02dd),
    (0xce, 0x02db),
    (0xcf, 0x02c7),
    (0xd0, 0x2014),
    (0xe1, 0x00c6),
    (0xe3, 0x00aa),
    (0xe8, 0x0141),
    (0xe9, 0x00d8),
    (0xea, 0x0152),
    (0xeb, 0x00ba),
    (0xf1, 0x00e6),
    (0xf5, 0x0131),
    (0xf8, 0x0142),
    (0xf9, 0x00f8),
    (0xfa, 0x0153),
    (0xfb, 0x00df),
];

/// WinAnsiEncoding 0x80..=0x9f; the rest of the upper half is Latin-1.
const WIN_ANSI_CONTROL_RANGE: &[(u8, u16)] = &[
    (0x80, 0x20ac),
    (0x82, 0x201a),
    (0x83, 0x0192),
    (0x84, 0x201e),
    (0x85, 0x2026),
    (0x86, 0x2020),
    (0x87, 0x2021),
    (0x88, 0x02c6),
    (0x89, 0x2030),
    (0x8a, 0x0160),
    (0x8b, 0x2039),
    (0x8c, 0x0152),
    (0x8e, 0x017d),
    (0x91, 0x2018),
    (0x92, 0x2019),
    (0x93, 0x201c),
    (0x94, 0x201d),
    (0x95, 0x2022),
    (0x96, 0x2013),
    (0x97, 0x2014),
    (0x98, 0x02dc),
    (0x99, 0x2122),
    (0x9a, 0x0161),
    (0x9b, 0x203a),
    (0x9c, 0x0153),
    (0x9e, 0x017e),
    (0x9f, 0x0178),
];

/// MacRomanEncoding 0x80..=0xff. Zero marks an unassigned code.
const MAC_ROMAN_HIGH: [u16; 128] = [
    0x00c4, 0x00c5, 0x00c7, 0x00c9, 0x00d1, 0x00d6, 0x00dc, 0x00e1, 0x00e0, 0x00e2, 0x00e4, 0x00e3, 0x00e5,
    0x00e7, 0x00e9, 0x00e8, 0x00ea, 0x00eb, 0x00ed, 0x00ec, 0x00ee, 0x00ef, 0x00f1, 0x00f3, 0x00f2, 0x00f4,
    0x00f6, 0x00f5, 0x00fa, 0x00f9, 0x00fb, 0x00fc, 0x2020, 0x00b0, 0x00a2, 0x00a3, 0x00a7, 0x2022, 0x00b6,
    0x00df, 0x00ae, 0x00a9, 0x2122, 0x00b4, 0x00a8, 0x2260, 0x00c6, 0x00d8, 0x221e, 0x00b1, 0x2264, 0x2265,
    0x00a5, 0x00b5, 0x2202, 0x2211, 0x220f, 0x03c0, 0x222b, 0x00aa, 0x00ba, 0x03a9, 0x00e6, 0x00f8, 0x00bf,
    0x00a1, 0x00ac, 0x221a, 0x0192, 0x2248, 0x2206, 0x00ab, 0x00bb, 0x2026, 0x00a0, 0x00c0, 0x00c3, 0x00d5,
    0x0152, 0x0153, 0x2013, 0x2014, 0x201c, 0x201d, 0x2018, 0x2019, 0x00f7, 0x25ca, 0x00ff, 0x0178, 0x2044,
    0x00a4, 0x2039, 0x203a, 0xfb01, 0xfb02, 0x2021, 0x00b7, 0x201a, 0x201e, 0x2030, 0x00c2, 0x00ca, 0x00c1,
    0x00cb, 0x00c8, 0x00cd, 0x00ce, 0x00cf, 0x00cc, 0x00d3, 0x00d4, 0x0000, 0x00d2, 0x00da, 0x00db, 0x00d9,
    0x0131, 0x02c6, 0x02dc, 0x00af, 0x02d8, 0x02d9, 0x02da, 0x00b8, 0x02dd, 0x02db, 0x02c7,
];
