//! The annotate-and-filter pipeline.
//!
//! A run moves through `Idle → Loaded → Scanning → Reconstructing → Reported
//! → Closed`. Each stage is its own type and every transition consumes the
//! previous stage, so a stage cannot be skipped or revisited. Documents are
//! owned by the stage that holds them and are released when it is dropped,
//! on success and on every error path alike.

use crate::document::PdfDocument;
use crate::stats::MatchTracker;
use crate::PdfEngineError;
use doc_model::{HighlightStyle, MatchReport, PageSelection, Worklist};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotateOptions {
    pub style: HighlightStyle,
}

/// Output of a completed run.
#[derive(Debug, Clone)]
pub struct Annotated {
    pub bytes: Vec<u8>,
    pub report: MatchReport,
}

/// Idle: holds configuration only.
#[derive(Debug, Clone, Default)]
pub struct Annotator {
    options: AnnotateOptions,
}

impl Annotator {
    pub fn new(options: AnnotateOptions) -> Self {
        Self { options }
    }

    pub fn load(&self, bytes: &[u8]) -> Result<LoadedRun<'_>, PdfEngineError> {
        let document = PdfDocument::from_bytes(bytes)?;
        log::debug!("loaded document with {} pages", document.page_count());

        Ok(LoadedRun { document, options: &self.options })
    }
}

#[derive(Debug)]
pub struct LoadedRun<'a> {
    document: PdfDocument,
    options: &'a AnnotateOptions,
}

impl<'a> LoadedRun<'a> {
    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    /// Search every page in ascending order, highlighting each match.
    ///
    /// Page 0 is searched and highlighted like any other page but is kept
    /// whether or not it matched.
    pub fn scan(mut self, worklist: &Worklist) -> Result<ScannedRun, PdfEngineError> {
        let page_count = self.document.page_count();
        let mut tracker = MatchTracker::new(worklist);
        let mut selection = PageSelection::new();

        for page in 0..page_count {
            let layout = self.document.layout(page)?;
            let mut page_matches = 0;

            for identifier in worklist {
                let locations = crate::search::search_page(&layout, page, identifier);
                for location in &locations {
                    self.document.highlight(location, &self.options.style)?;
                }
                tracker.record(page, identifier, locations.len());
                page_matches += locations.len();
            }

            if page_matches > 0 {
                selection.insert(page);
            }
            log::debug!("page {page}: {page_matches} matches");
        }

        log::debug!("scanned {page_count} pages, {} selected", selection.len());
        Ok(ScannedRun { document: self.document, tracker, selection })
    }
}

#[derive(Debug)]
pub struct ScannedRun {
    document: PdfDocument,
    tracker: MatchTracker,
    selection: PageSelection,
}

impl ScannedRun {
    pub fn selection(&self) -> &PageSelection {
        &self.selection
    }

    /// Build the filtered output and release the input document.
    pub fn reconstruct(self) -> Result<ReconstructedRun, PdfEngineError> {
        let output = self.document.select(&self.selection)?;
        let page_count = self.document.page_count();
        drop(self.document);
        log::debug!("input document closed, output holds {} pages", output.page_count());

        Ok(ReconstructedRun { output, tracker: self.tracker, selection: self.selection, page_count })
    }
}

#[derive(Debug)]
pub struct ReconstructedRun {
    output: PdfDocument,
    tracker: MatchTracker,
    selection: PageSelection,
    page_count: u32,
}

impl ReconstructedRun {
    pub fn output_page_count(&self) -> u32 {
        self.output.page_count()
    }

    /// Serialize the output and finalize the report. Closes the output document.
    pub fn report(mut self) -> Result<Annotated, PdfEngineError> {
        let bytes = self.output.to_bytes()?;
        let report = self.tracker.finish(self.page_count, self.selection.to_vec());

        log::info!(
            "{} matches, kept {} of {} pages, {} identifiers not found",
            report.total_matches,
            report.kept_pages.len(),
            report.page_count,
            report.not_found.len()
        );

        Ok(Annotated { bytes, report })
    }
}

/// Highlight every worklist identifier in `document` and keep page 0 plus matching pages.
pub fn annotate(document: &[u8], worklist: &Worklist) -> Result<Annotated, PdfEngineError> {
    annotate_with(document, worklist, &AnnotateOptions::default())
}

pub fn annotate_with(
    document: &[u8],
    worklist: &Worklist,
    options: &AnnotateOptions,
) -> Result<Annotated, PdfEngineError> {
    let annotator = Annotator::new(options.clone());
    annotator.load(document)?.scan(worklist)?.reconstruct()?.report()
}
