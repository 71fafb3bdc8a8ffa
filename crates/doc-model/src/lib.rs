use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Opaque exact-match token searched for in page text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifiers in source row order. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worklist {
    identifiers: Vec<Identifier>,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identifier: impl Into<Identifier>) {
        self.identifiers.push(identifier.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identifier> {
        self.identifiers.iter()
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn as_slice(&self) -> &[Identifier] {
        &self.identifiers
    }

    /// Set view of the worklist, duplicates collapsed.
    pub fn unique(&self) -> BTreeSet<Identifier> {
        self.identifiers.iter().cloned().collect()
    }
}

impl<T: Into<Identifier>> FromIterator<T> for Worklist {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self { identifiers: iter.into_iter().map(Into::into).collect() }
    }
}

impl<'a> IntoIterator for &'a Worklist {
    type Item = &'a Identifier;
    type IntoIter = std::slice::Iter<'a, Identifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.identifiers.iter()
    }
}

/// Axis-aligned box in PDF user space (points, origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0: x0.min(x1), y0: y0.min(y1), x1: x0.max(x1), y1: y0.max(y1) }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }
}

/// One occurrence of an identifier on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchLocation {
    pub page: u32,
    pub identifier: Identifier,
    /// Character offsets into the page text, end exclusive.
    pub start: usize,
    pub end: usize,
    /// One box per line fragment the match covers.
    pub fragments: Vec<Rect>,
    pub bbox: Rect,
}

/// Ascending, duplicate-free page indices kept in the output. Always holds 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSelection {
    pages: BTreeSet<u32>,
}

impl Default for PageSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSelection {
    pub fn new() -> Self {
        Self { pages: BTreeSet::from([0]) }
    }

    pub fn insert(&mut self, page: u32) -> bool {
        self.pages.insert(page)
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.pages.iter().copied().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMatches {
    pub page: u32,
    pub matches: usize,
}

/// Final, read-only outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub total_matches: usize,
    pub found: Vec<Identifier>,
    pub not_found: Vec<Identifier>,
    pub page_count: u32,
    pub kept_pages: Vec<u32>,
    pub matches_by_identifier: BTreeMap<Identifier, usize>,
    pub matches_by_page: Vec<PageMatches>,
}

impl MatchReport {
    pub fn is_found(&self, identifier: &str) -> bool {
        self.found.iter().any(|found| found.as_str() == identifier)
    }
}

/// Highlight colour (0..=1 RGB) and opacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    pub color: [f32; 3],
    pub opacity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self { color: [1.0, 1.0, 0.0], opacity: 0.5 }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("invalid colour {0:?}, expected RRGGBB hex")]
    InvalidColor(String),
}

impl HighlightStyle {
    /// Parse `#RRGGBB` / `RRGGBB` into a colour, keeping the current opacity.
    pub fn with_hex_color(mut self, hex: &str) -> Result<Self, StyleError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(StyleError::InvalidColor(hex.to_owned()));
        }

        let mut color = [0.0; 3];
        for (slot, chunk) in color.iter_mut().zip([0, 2, 4]) {
            let value = u8::from_str_radix(&digits[chunk..chunk + 2], 16)
                .map_err(|_| StyleError::InvalidColor(hex.to_owned()))?;
            *slot = value as f32 / 255.0;
        }

        self.color = color;
        Ok(self)
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }
}
