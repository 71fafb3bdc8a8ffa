use doc_model::{Identifier, MatchReport, PageMatches, Worklist};
use std::collections::{BTreeMap, BTreeSet};

/// Single accumulation point for match counts during a scan.
///
/// The tracker is consumed by [`MatchTracker::finish`], so a report can only
/// be obtained once the whole document has been scanned.
#[derive(Debug)]
pub struct MatchTracker {
    worklist: BTreeSet<Identifier>,
    found: BTreeSet<Identifier>,
    by_identifier: BTreeMap<Identifier, usize>,
    by_page: Vec<PageMatches>,
    total: usize,
}

impl MatchTracker {
    pub fn new(worklist: &Worklist) -> Self {
        Self {
            worklist: worklist.unique(),
            found: BTreeSet::new(),
            by_identifier: BTreeMap::new(),
            by_page: Vec::new(),
            total: 0,
        }
    }

    /// Record the matches of one identifier on one page.
    pub fn record(&mut self, page: u32, identifier: &Identifier, matches: usize) {
        if matches == 0 {
            return;
        }

        self.total += matches;
        *self.by_identifier.entry(identifier.clone()).or_default() += matches;
        if !self.found.contains(identifier) {
            log::debug!("first match for {identifier} on page {page}");
            self.found.insert(identifier.clone());
        }

        match self.by_page.last_mut() {
            Some(entry) if entry.page == page => entry.matches += matches,
            _ => self.by_page.push(PageMatches { page, matches }),
        }
    }

    pub fn finish(self, page_count: u32, kept_pages: Vec<u32>) -> MatchReport {
        let not_found = self.worklist.difference(&self.found).cloned().collect();

        MatchReport {
            total_matches: self.total,
            found: self.found.into_iter().collect(),
            not_found,
            page_count,
            kept_pages,
            matches_by_identifier: self.by_identifier,
            matches_by_page: self.by_page,
        }
    }
}
