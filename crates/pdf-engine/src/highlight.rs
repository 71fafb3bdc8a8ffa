use crate::PdfEngineError;
use doc_model::{HighlightStyle, MatchLocation, Rect};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::fmt::Write as FmtWrite;

/// Add one `/Highlight` annotation covering `location` to the page.
///
/// Every call appends a new annotation, even for a location that is already
/// highlighted. The page content stream is left untouched.
pub fn add_highlight(
    doc: &mut Document,
    page_id: ObjectId,
    location: &MatchLocation,
    style: &HighlightStyle,
) -> Result<ObjectId, PdfEngineError> {
    let bbox = location.bbox;
    let [r, g, b] = style.color;

    let appearance_id = doc.add_object(appearance_stream(location, style)?);

    let quad_points: Vec<Object> = location
        .fragments
        .iter()
        .flat_map(|rect| {
            [rect.x0, rect.y1, rect.x1, rect.y1, rect.x0, rect.y0, rect.x1, rect.y0].map(Object::Real)
        })
        .collect();

    let annotation = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Highlight",
        "Rect" => rect_array(&bbox),
        "QuadPoints" => quad_points,
        "C" => vec![Object::Real(r), Object::Real(g), Object::Real(b)],
        "CA" => Object::Real(style.opacity),
        "F" => 4,
        "P" => page_id,
        "Contents" => Object::String(location.identifier.as_str().as_bytes().to_vec(), StringFormat::Literal),
        "AP" => dictionary! { "N" => appearance_id },
    };
    let annotation_id = doc.add_object(annotation);

    attach_to_page(doc, page_id, annotation_id)?;
    Ok(annotation_id)
}

fn rect_array(rect: &Rect) -> Vec<Object> {
    vec![Object::Real(rect.x0), Object::Real(rect.y0), Object::Real(rect.x1), Object::Real(rect.y1)]
}

/// Multiply-blended filled quads, so the text underneath stays readable.
fn appearance_stream(location: &MatchLocation, style: &HighlightStyle) -> Result<Stream, PdfEngineError> {
    let [r, g, b] = style.color;
    let mut content = String::new();

    let mut write = || -> std::fmt::Result {
        writeln!(content, "/GS0 gs")?;
        writeln!(content, "{r} {g} {b} rg")?;
        for rect in &location.fragments {
            writeln!(content, "{} {} {} {} re", rect.x0, rect.y0, rect.width(), rect.height())?;
        }
        writeln!(content, "f")
    };
    write().map_err(|err| PdfEngineError::Write(err.to_string()))?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => rect_array(&location.bbox),
            "Resources" => dictionary! {
                "ExtGState" => dictionary! {
                    "GS0" => dictionary! {
                        "Type" => "ExtGState",
                        "BM" => "Multiply",
                        "ca" => Object::Real(style.opacity),
                        "CA" => Object::Real(style.opacity),
                    },
                },
            },
        },
        content.into_bytes(),
    ))
}

fn attach_to_page(doc: &mut Document, page_id: ObjectId, annotation_id: ObjectId) -> Result<(), PdfEngineError> {
    let annots = doc
        .get_dictionary(page_id)
        .map_err(|_| PdfEngineError::Malformed(format!("page object {page_id:?} is not a dictionary")))?
        .get(b"Annots")
        .ok()
        .cloned();

    match annots {
        Some(Object::Reference(array_id)) => match doc.get_object_mut(array_id) {
            Ok(Object::Array(items)) => items.push(Object::Reference(annotation_id)),
            _ => {
                return Err(PdfEngineError::Malformed(format!(
                    "/Annots of page {page_id:?} does not reference an array"
                )))
            }
        },
        Some(Object::Array(mut items)) => {
            items.push(Object::Reference(annotation_id));
            set_annots(doc, page_id, items)?;
        }
        _ => set_annots(doc, page_id, vec![Object::Reference(annotation_id)])?,
    }

    Ok(())
}

fn set_annots(doc: &mut Document, page_id: ObjectId, items: Vec<Object>) -> Result<(), PdfEngineError> {
    doc.get_dictionary_mut(page_id)
        .map_err(|_| PdfEngineError::Malformed(format!("page object {page_id:?} is not a dictionary")))?
        .set("Annots", items);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixturePage, PdfFixture};
    use crate::layout::page_layout;
    use doc_model::Identifier;

    fn location(page: u32) -> MatchLocation {
        let rect = Rect::new(72.0, 700.0, 100.0, 712.0);
        MatchLocation {
            page,
            identifier: Identifier::from("12345"),
            start: 0,
            end: 5,
            fragments: vec![rect],
            bbox: rect,
        }
    }

    fn annots(doc: &Document, page_id: ObjectId) -> Vec<Object> {
        match doc.get_dictionary(page_id).expect("page").get(b"Annots") {
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn adds_highlight_annotation_with_quad_points() {
        let mut doc = Document::load_mem(&PdfFixture::text_pages(&["12345"]).build()).expect("parse");
        let page_id = *doc.get_pages().get(&1).expect("page");

        let id = add_highlight(&mut doc, page_id, &location(0), &HighlightStyle::default()).expect("highlight");

        let annotation = doc.get_dictionary(id).expect("annotation");
        assert_eq!(annotation.get(b"Subtype").ok().and_then(crate::objects::name), Some(b"Highlight".as_slice()));
        match annotation.get(b"QuadPoints") {
            Ok(Object::Array(points)) => assert_eq!(points.len(), 8),
            other => panic!("unexpected QuadPoints {other:?}"),
        }
        assert!(annotation.get(b"AP").is_ok());
        let attached = annots(&doc, page_id);
        assert_eq!(attached.len(), 1);
        assert!(matches!(attached[0], Object::Reference(attached_id) if attached_id == id));
    }

    #[test]
    fn repeated_calls_stack_annotations() {
        let mut doc = Document::load_mem(&PdfFixture::text_pages(&["12345"]).build()).expect("parse");
        let page_id = *doc.get_pages().get(&1).expect("page");
        let style = HighlightStyle::default();

        add_highlight(&mut doc, page_id, &location(0), &style).expect("first");
        add_highlight(&mut doc, page_id, &location(0), &style).expect("second");

        assert_eq!(annots(&doc, page_id).len(), 2);
    }

    #[test]
    fn keeps_existing_annotations() {
        let fixture = PdfFixture::new().page(FixturePage::lines(&["12345"]).linking_to(0));
        let mut doc = Document::load_mem(&fixture.build()).expect("parse");
        let page_id = *doc.get_pages().get(&1).expect("page");

        add_highlight(&mut doc, page_id, &location(0), &HighlightStyle::default()).expect("highlight");

        assert_eq!(annots(&doc, page_id).len(), 2);
    }

    #[test]
    fn highlighting_does_not_change_page_text() {
        let mut doc = Document::load_mem(&PdfFixture::text_pages(&["UAN 12345"]).build()).expect("parse");
        let page_id = *doc.get_pages().get(&1).expect("page");
        let before = page_layout(&doc, page_id);

        add_highlight(&mut doc, page_id, &location(0), &HighlightStyle::default()).expect("highlight");

        assert_eq!(page_layout(&doc, page_id), before);
    }
}
