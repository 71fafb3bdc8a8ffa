mod annotator;
mod cmap;
mod document;
mod encoding;
mod fonts;
mod geometry;
mod highlight;
mod layout;
pub(crate) mod objects;
mod search;
mod select;
mod stats;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

use std::path::{Path, PathBuf};

pub use annotator::{
    annotate, annotate_with, AnnotateOptions, Annotated, Annotator, LoadedRun, ReconstructedRun,
    ScannedRun,
};
pub use document::{PageSize, PdfDocument};
pub use geometry::Matrix;
pub use highlight::add_highlight;
pub use layout::{page_layout, LaidChar, TextLayout};
pub use search::search_page;
pub use select::reconstruct;
pub use stats::MatchTracker;

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load PDF: {0}")]
    Load(#[from] lopdf::Error),
    #[error("document has no pages")]
    NoPages,
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("malformed PDF: {0}")]
    Malformed(String),
    #[error("failed to write PDF: {0}")]
    Write(String),
}

impl PdfEngineError {
    /// True when the input could not be opened as a PDF at all.
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Load(_) | Self::NoPages | Self::EncryptedUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::PdfFixture;
    use doc_model::Worklist;

    #[test]
    fn open_source_conversions() {
        assert!(matches!(OpenSource::from(PathBuf::from("a.pdf")), OpenSource::Path(_)));
        assert!(matches!(OpenSource::from(Path::new("a.pdf")), OpenSource::Path(_)));
        assert!(matches!(OpenSource::from(vec![1u8, 2]), OpenSource::Bytes(bytes) if bytes == [1, 2]));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PdfDocument::open(Path::new("/definitely/not/here.pdf")).expect_err("should fail");

        assert!(matches!(err, PdfEngineError::Io(_)));
        assert!(err.is_load_error());
    }

    #[test]
    fn page_errors_are_not_load_errors() {
        let err = PdfEngineError::PageOutOfRange { page: 2, page_count: 1 };
        assert!(!err.is_load_error());
        assert_eq!(err.to_string(), "page 2 out of range (page_count=1)");
    }

    #[test]
    fn annotate_round_trip_through_public_api() {
        let pdf = PdfFixture::text_pages(&["cover", "ESI 998877"]).build();
        let worklist: Worklist = ["998877"].into_iter().collect();

        let annotated = annotate(&pdf, &worklist).expect("annotate");
        let output = PdfDocument::from_bytes(&annotated.bytes).expect("reload");

        assert_eq!(output.page_count(), 2);
        assert_eq!(annotated.report.kept_pages, vec![0, 1]);
    }
}
