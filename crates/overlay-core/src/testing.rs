//! Scriptable in-memory engine for unit tests.

use pdf_engine::{
    DocumentHandle, NormalizedColor, OpenSource, PagePoint, PageSize, PdfEngine, PdfEngineError,
    RenderRequest, RgbaImage,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FakeOp {
    Line { page: u32, from: PagePoint, to: PagePoint, color: NormalizedColor, width: f32 },
    Text { page: u32, at: PagePoint, text: String, font: String, size: f32, color: NormalizedColor },
}

#[derive(Debug, Clone)]
struct FakeDocument {
    pages: Vec<PageSize>,
    ops: Vec<FakeOp>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, FakeDocument>,
    /// Documents `open` can find by path.
    pub files: HashMap<PathBuf, Vec<PageSize>>,
    pub fail_render_page: Option<u32>,
    /// Fail the write operation with this zero-based index.
    pub fail_write_at: Option<usize>,
    pub fail_save: bool,
    pub writes: usize,
    pub saved: Vec<(PathBuf, Vec<FakeOp>)>,
}

impl FakeEngine {
    pub fn with_pages(pages: &[(f32, f32)]) -> (Self, DocumentHandle) {
        let mut engine = Self::default();
        let handle = engine.insert(FakeDocument { pages: sizes(pages), ops: Vec::new() });
        (engine, handle)
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, pages: &[(f32, f32)]) {
        self.files.insert(path.into(), sizes(pages));
    }

    pub fn open_documents(&self) -> usize {
        self.docs.len()
    }

    pub fn ops(&self, handle: DocumentHandle) -> Vec<FakeOp> {
        self.docs.get(&handle).map(|doc| doc.ops.clone()).unwrap_or_default()
    }

    fn insert(&mut self, document: FakeDocument) -> DocumentHandle {
        self.next_handle += 1;
        let handle = DocumentHandle::from_raw(self.next_handle);
        self.docs.insert(handle, document);
        handle
    }

    fn doc(&self, handle: DocumentHandle) -> Result<&FakeDocument, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn write(&mut self, handle: DocumentHandle, op: FakeOp) -> Result<(), PdfEngineError> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_write_at == Some(index) {
            return Err(PdfEngineError::Backend("injected write failure".to_owned()));
        }

        self.docs
            .get_mut(&handle)
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))?
            .ops
            .push(op);
        Ok(())
    }
}

fn sizes(pages: &[(f32, f32)]) -> Vec<PageSize> {
    pages.iter().map(|&(width_pt, height_pt)| PageSize { width_pt, height_pt }).collect()
}

impl PdfEngine for FakeEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let OpenSource::Path(path) = source else {
            return Err(PdfEngineError::Backend("fake engine opens paths only".to_owned()));
        };
        let pages = self.files.get(&path).cloned().ok_or_else(|| {
            PdfEngineError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
        })?;
        if pages.is_empty() {
            return Err(PdfEngineError::Empty);
        }

        Ok(self.insert(FakeDocument { pages, ops: Vec::new() }))
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.doc(handle)?.pages.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let doc = self.doc(handle)?;
        doc.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: doc.pages.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        if self.fail_render_page == Some(request.page_index) {
            return Err(PdfEngineError::Backend("corrupt page".to_owned()));
        }

        let size = self.page_size(handle, request.page_index)?;
        let width = (size.width_pt * request.scale).round().max(1.0) as u32;
        let height = (size.height_pt * request.scale).round().max(1.0) as u32;
        Ok(RgbaImage::new(width, height))
    }

    fn draw_line(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        from: PagePoint,
        to: PagePoint,
        color: NormalizedColor,
        width: f32,
    ) -> Result<(), PdfEngineError> {
        self.page_size(handle, page_index)?;
        self.write(handle, FakeOp::Line { page: page_index, from, to, color, width })
    }

    fn insert_text(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        at: PagePoint,
        text: &str,
        font_name: &str,
        font_size: f32,
        color: NormalizedColor,
    ) -> Result<(), PdfEngineError> {
        self.page_size(handle, page_index)?;
        self.write(
            handle,
            FakeOp::Text {
                page: page_index,
                at,
                text: text.to_owned(),
                font: font_name.to_owned(),
                size: font_size,
                color,
            },
        )
    }

    fn duplicate(&mut self, handle: DocumentHandle) -> Result<DocumentHandle, PdfEngineError> {
        let document = self.doc(handle)?.clone();
        Ok(self.insert(document))
    }

    fn save(&mut self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError> {
        let ops = self.doc(handle)?.ops.clone();
        if self.fail_save {
            return Err(PdfEngineError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only destination",
            )));
        }

        self.saved.push((path.to_path_buf(), ops));
        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}
