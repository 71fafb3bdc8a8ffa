use crate::layout::TextLayout;
use doc_model::{Identifier, MatchLocation, Rect};

/// Find every occurrence of `identifier` in a page's text.
///
/// Matching is exact and case-sensitive on the laid-out text. Occurrences of
/// one identifier do not overlap each other; occurrences of different
/// identifiers are found independently, so `"1"` also matches inside `"11"`.
pub fn search_page(layout: &TextLayout, page: u32, identifier: &Identifier) -> Vec<MatchLocation> {
    if identifier.is_empty() {
        return Vec::new();
    }

    layout
        .text()
        .match_indices(identifier.as_str())
        .filter_map(|(byte_start, matched)| {
            let start = layout.char_index(byte_start);
            let end = layout.char_index(byte_start + matched.len());
            let fragments = line_fragments(layout, start, end);

            let Some(bbox) = fragments.iter().copied().reduce(|acc, rect| acc.union(&rect)) else {
                log::debug!("match of {identifier} on page {page} has no glyph geometry");
                return None;
            };

            Some(MatchLocation { page, identifier: identifier.clone(), start, end, fragments, bbox })
        })
        .collect()
}

/// Union of glyph boxes in `start..end`, split wherever the text changes line.
fn line_fragments(layout: &TextLayout, start: usize, end: usize) -> Vec<Rect> {
    let mut fragments: Vec<Rect> = Vec::new();

    for rect in layout.chars()[start..end].iter().filter_map(|c| c.bbox) {
        match fragments.last_mut() {
            Some(current) if (current.center_y() - rect.center_y()).abs() <= current.height() / 2.0 => {
                *current = current.union(&rect);
            }
            _ => fragments.push(rect),
        }
    }

    fragments
}
