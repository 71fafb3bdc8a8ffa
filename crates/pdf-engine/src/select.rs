//! Page selection and document reconstruction.

use crate::objects::{inherited, name, resolve_dict};
use crate::PdfEngineError;
use doc_model::PageSelection;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet, VecDeque};

const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Build a fresh document holding the selected pages of `source`, in ascending order.
///
/// `page_ids[i]` is the object id of page `i` in `source`. Objects reachable
/// from the selected pages are deep-copied under new ids; references to
/// pages that are not selected become `null`.
pub fn reconstruct(
    source: &Document,
    page_ids: &[ObjectId],
    selection: &PageSelection,
) -> Result<Document, PdfEngineError> {
    let mut copier = Copier::new(source, page_ids, selection);
    let pages_id = copier.out.new_object_id();
    copier.pages_node = Some(pages_id);

    let mut kids = Vec::with_capacity(selection.len());
    for index in selection.iter() {
        let source_id = *page_ids.get(index as usize).ok_or(PdfEngineError::PageOutOfRange {
            page: index,
            page_count: page_ids.len() as u32,
        })?;
        let new_id = copier.id_for(source_id);

        let mut page = source
            .get_dictionary(source_id)
            .map_err(|_| PdfEngineError::Malformed(format!("page {index} is not a dictionary")))?
            .clone();
        page.remove(b"Parent");
        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = inherited(source, source_id, key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }

        let mut page = copier.copy_dict(&page);
        page.set("Parent", pages_id);
        copier.out.objects.insert(new_id, Object::Dictionary(page));
        kids.push(Object::Reference(new_id));
    }

    copier.drain()?;

    let count = kids.len() as i64;
    copier.out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = copier.out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    copier.out.trailer.set("Root", catalog_id);

    if let Ok(info) = source.trailer.get(b"Info") {
        let info = copier.copy(info);
        copier.drain()?;
        copier.out.trailer.set("Info", info);
    }

    log::debug!("reconstructed {} of {} pages, {} objects", count, page_ids.len(), copier.out.objects.len());
    Ok(copier.out)
}

struct Copier<'a> {
    source: &'a Document,
    out: Document,
    mapped: HashMap<ObjectId, ObjectId>,
    pending: VecDeque<ObjectId>,
    dropped_pages: HashSet<ObjectId>,
    pages_node: Option<ObjectId>,
}

impl<'a> Copier<'a> {
    fn new(source: &'a Document, page_ids: &[ObjectId], selection: &PageSelection) -> Self {
        let dropped_pages = page_ids
            .iter()
            .enumerate()
            .filter(|(index, _)| !selection.contains(*index as u32))
            .map(|(_, id)| *id)
            .collect();

        let mut out = Document::with_version(source.version.as_str());
        let mut mapped = HashMap::new();
        for index in selection.iter() {
            if let Some(id) = page_ids.get(index as usize) {
                mapped.insert(*id, out.new_object_id());
            }
        }

        Self { source, out, mapped, pending: VecDeque::new(), dropped_pages, pages_node: None }
    }

    fn id_for(&mut self, source_id: ObjectId) -> ObjectId {
        if let Some(id) = self.mapped.get(&source_id) {
            return *id;
        }
        let id = self.out.new_object_id();
        self.mapped.insert(source_id, id);
        self.pending.push_back(source_id);
        id
    }

    fn is_page_tree_node(&self, id: ObjectId) -> bool {
        self.source
            .get_object(id)
            .ok()
            .and_then(|object| resolve_dict(self.source, object))
            .and_then(|dict| dict.get(b"Type").ok())
            .and_then(name)
            == Some(b"Pages".as_slice())
    }

    fn copy(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) if self.dropped_pages.contains(id) => Object::Null,
            Object::Reference(id) if self.is_page_tree_node(*id) => match self.pages_node {
                Some(pages) => Object::Reference(pages),
                None => Object::Null,
            },
            Object::Reference(id) => Object::Reference(self.id_for(*id)),
            Object::Array(items) => Object::Array(items.iter().map(|item| self.copy(item)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.copy_dict(&stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn copy_dict(&mut self, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.copy(value));
        }
        copied
    }

    fn drain(&mut self) -> Result<(), PdfEngineError> {
        while let Some(source_id) = self.pending.pop_front() {
            let new_id = self.mapped[&source_id];
            let object = match self.source.get_object(source_id) {
                Ok(object) => self.copy(object),
                Err(_) => {
                    log::warn!("dangling reference {source_id:?} replaced with null");
                    Object::Null
                }
            };
            self.out.objects.insert(new_id, object);
        }
        Ok(())
    }
}
