use lopdf::{Dictionary, Document, Object, ObjectId};

const MAX_REFERENCE_DEPTH: usize = 32;
const MAX_PARENT_DEPTH: usize = 64;

/// Follow indirect references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> Option<&'a Object> {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match object {
            Object::Reference(id) => object = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub(crate) fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    resolve(doc, dict.get(key).ok()?)
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

pub(crate) fn numbers(doc: &Document, object: &Object) -> Option<Vec<f32>> {
    match resolve(doc, object)? {
        Object::Array(items) => {
            items.iter().map(|item| resolve(doc, item).and_then(number)).collect()
        }
        _ => None,
    }
}

pub(crate) fn name(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

/// Look up a page attribute, walking `/Parent` for inheritable keys.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(value) = dict_get(doc, current, key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?;
        current = resolve_dict(doc, parent)?;
    }
    None
}

/// Decoded bytes of a stream, falling back to the raw content when a filter is unsupported.
pub(crate) fn stream_bytes(stream: &lopdf::Stream) -> Vec<u8> {
    if stream.dict.has(b"Filter") {
        match stream.decompressed_content() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("could not decode stream: {err}");
                stream.content.clone()
            }
        }
    } else {
        stream.content.clone()
    }
}
