//! Minimal `/ToUnicode` CMap reader.
//!
//! Only the parts needed to turn show-text codes back into characters are
//! understood: `codespacerange` (for the code width), `bfchar` and `bfrange`.

use std::collections::HashMap;

/// Upper bound on the codes one range entry may expand to.
pub(crate) const MAX_RANGE_ENTRIES: u32 = 10_000;

#[derive(Debug, Clone, Default)]
pub struct ToUnicode {
    map: HashMap<u32, String>,
    code_bytes: usize,
}

#[derive(Debug, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = ToUnicode::default();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(word) if word == "begincodespacerange" => {
                    if let Some(Token::Hex(lo)) = tokens.get(i + 1) {
                        if cmap.code_bytes == 0 {
                            cmap.code_bytes = lo.len();
                        }
                    }
                    i += 1;
                }
                Token::Word(word) if word == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.note_width(src.len());
                        cmap.map.insert(code_of(src), utf16_text(dst));
                        i += 2;
                    }
                }
                Token::Word(word) if word == "beginbfrange" => {
                    i += 1;
                    i = cmap.parse_ranges(&tokens, i);
                }
                _ => i += 1,
            }
        }

        if cmap.code_bytes == 0 {
            cmap.code_bytes = 1;
        }
        cmap
    }

    fn parse_ranges(&mut self, tokens: &[Token], mut i: usize) -> usize {
        loop {
            let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (tokens.get(i), tokens.get(i + 1))
            else {
                return i;
            };
            self.note_width(lo.len());
            let (lo_code, hi_code) = (code_of(lo), code_of(hi));

            let hi_code = capped_end(lo_code, hi_code);

            match tokens.get(i + 2) {
                Some(Token::Hex(dst)) => {
                    let base: Vec<u16> = utf16_units(dst);
                    for (offset, code) in (lo_code..=hi_code).enumerate() {
                        let mut units = base.clone();
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add(offset as u16);
                        }
                        self.map.insert(code, String::from_utf16_lossy(&units));
                    }
                    i += 3;
                }
                Some(Token::ArrayStart) => {
                    i += 3;
                    let mut next = Some(lo_code);
                    while let Some(Token::Hex(dst)) = tokens.get(i) {
                        if let Some(code) = next.filter(|code| *code <= hi_code) {
                            self.map.insert(code, utf16_text(dst));
                        }
                        next = next.and_then(|code| code.checked_add(1));
                        i += 1;
                    }
                    if tokens.get(i) == Some(&Token::ArrayEnd) {
                        i += 1;
                    }
                }
                _ => return i + 2,
            }
        }
    }

    fn note_width(&mut self, width: usize) {
        if self.code_bytes == 0 {
            self.code_bytes = width.clamp(1, 4);
        }
    }

    pub fn code_bytes(&self) -> usize {
        self.code_bytes
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Last code of `lo..=hi` once clamped to [`MAX_RANGE_ENTRIES`] codes.
pub(crate) fn capped_end(lo: u32, hi: u32) -> u32 {
    let limit = lo.saturating_add(MAX_RANGE_ENTRIES - 1);
    if hi > limit {
        log::warn!("range {lo:#x}..={hi:#x} truncated to {MAX_RANGE_ENTRIES} codes");
        limit
    } else {
        hi
    }
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = data[start..].iter().position(|b| *b == b'>').map_or(data.len(), |p| start + p);
                tokens.push(Token::Hex(decode_hex(&data[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings only appear in the CMap header; skip them.
                let mut depth = 0;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            byte if byte.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                i += 1;
                while i < data.len() && !is_delimiter(data[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }

    tokens
}

fn is_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'<' | b'>' | b'[' | b']' | b'(' | b')' | b'%' | b'/')
}

fn decode_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|digit| (*digit as char).to_digit(16).map(|value| value as u8))
        .collect();

    nibbles
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => (hi << 4) | lo,
            [hi] => hi << 4,
            _ => 0,
        })
        .collect()
}
