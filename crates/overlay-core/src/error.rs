//! User-facing failures. None of them are fatal: after any of these the
//! session keeps its last good document, view and annotations.

use pdf_engine::PdfEngineError;
use std::path::PathBuf;

/// Opening a document failed; the previously open document stays active.
/// Covers unreadable paths, non-PDF input and documents without pages.
#[derive(Debug, thiserror::Error)]
#[error("failed to open {}: {source}", path.display())]
pub struct DocumentOpenError {
    pub path: PathBuf,
    #[source]
    pub source: PdfEngineError,
}

/// A render pass was aborted; the view keeps its previous contents.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read document layout: {0}")]
    Layout(#[source] PdfEngineError),
    #[error("failed to render page {}: {source}", page + 1)]
    Page {
        page: u32,
        #[source]
        source: PdfEngineError,
    },
}

/// Saving failed; the annotation store is unchanged and saving can be retried.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("no document is open")]
    NoDocument,
    #[error("failed to prepare the document for saving: {0}")]
    Prepare(#[source] PdfEngineError),
    #[error("failed to write annotation onto page {}: {source}", page + 1)]
    Bake {
        page: usize,
        #[source]
        source: PdfEngineError,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: PdfEngineError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error(transparent)]
    Open(#[from] DocumentOpenError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Save(#[from] SaveError),
}
