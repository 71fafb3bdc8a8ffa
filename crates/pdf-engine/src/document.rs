use crate::highlight::add_highlight;
use crate::layout::{page_layout, TextLayout};
use crate::objects::{inherited, numbers};
use crate::search::search_page;
use crate::select::reconstruct;
use crate::{OpenSource, PdfEngineError};
use doc_model::{HighlightStyle, Identifier, MatchLocation, PageSelection};
use lopdf::{Document, ObjectId};
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// A loaded PDF, indexed by zero-based page number.
#[derive(Debug)]
pub struct PdfDocument {
    inner: Document,
    page_ids: Vec<ObjectId>,
}

impl PdfDocument {
    pub fn open(source: impl Into<OpenSource>) -> Result<Self, PdfEngineError> {
        match source.into() {
            OpenSource::Path(path) => Self::from_bytes(&fs::read(path)?),
            OpenSource::Bytes(bytes) => Self::from_bytes(&bytes),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        let inner = match Document::load_mem(bytes) {
            Ok(inner) => inner,
            // An encrypted file lopdf cannot open is still reported as encrypted.
            Err(_) if mentions_encrypt(bytes) => return Err(PdfEngineError::EncryptedUnsupported),
            Err(err) => return Err(err.into()),
        };
        if inner.trailer.has(b"Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        Self::from_document(inner)
    }

    fn from_document(inner: Document) -> Result<Self, PdfEngineError> {
        let page_ids: Vec<ObjectId> = inner.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(Self { inner, page_ids })
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    fn page_id(&self, page: u32) -> Result<ObjectId, PdfEngineError> {
        self.page_ids
            .get(page as usize)
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange { page, page_count: self.page_count() })
    }

    pub fn page_size(&self, page: u32) -> Result<PageSize, PdfEngineError> {
        let page_id = self.page_id(page)?;
        let size = inherited(&self.inner, page_id, b"MediaBox")
            .and_then(|object| numbers(&self.inner, object))
            .and_then(|values| match values[..] {
                [x0, y0, x1, y1] => Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() }),
                _ => None,
            })
            .unwrap_or_default();

        Ok(size)
    }

    pub fn layout(&self, page: u32) -> Result<TextLayout, PdfEngineError> {
        Ok(page_layout(&self.inner, self.page_id(page)?))
    }

    pub fn search(&self, page: u32, identifier: &Identifier) -> Result<Vec<MatchLocation>, PdfEngineError> {
        Ok(search_page(&self.layout(page)?, page, identifier))
    }

    pub fn highlight(&mut self, location: &MatchLocation, style: &HighlightStyle) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(location.page)?;
        add_highlight(&mut self.inner, page_id, location, style)?;
        Ok(())
    }

    /// Copy the selected pages into a new, independent document.
    pub fn select(&self, selection: &PageSelection) -> Result<PdfDocument, PdfEngineError> {
        Self::from_document(reconstruct(&self.inner, &self.page_ids, selection)?)
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PdfEngineError> {
        let mut bytes = Vec::new();
        self.inner.save_to(&mut bytes).map_err(|err| PdfEngineError::Write(err.to_string()))?;
        Ok(bytes)
    }
}

fn mentions_encrypt(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt")
}
