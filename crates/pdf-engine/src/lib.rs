use image::{ImageBuffer, Rgba};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod fixtures;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Per-channel colour in `0.0..=1.0`, the form PDF content streams take.
pub type NormalizedColor = [f32; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// For backends living outside this crate.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// A point in page-native space: PDF points with the origin at the page's
/// top-left corner and y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

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
    #[error("not a PDF document: {0}")]
    NotAPdf(lopdf::Error),
    #[error("document has no pages")]
    Empty,
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Rendering and editing primitives the overlay engine needs from a document
/// backend. All page coordinates are page-native ([`PagePoint`]).
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn draw_line(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        from: PagePoint,
        to: PagePoint,
        color: NormalizedColor,
        width: f32,
    ) -> Result<(), PdfEngineError>;
    #[allow(clippy::too_many_arguments)]
    fn insert_text(
        &mut self,
        handle: DocumentHandle,
        page_index: u32,
        at: PagePoint,
        text: &str,
        font_name: &str,
        font_size: f32,
        color: NormalizedColor,
    ) -> Result<(), PdfEngineError>;
    /// Opens an independent copy of a document; edits to one never show in the other.
    fn duplicate(&mut self, handle: DocumentHandle) -> Result<DocumentHandle, PdfEngineError>;
    fn save(&mut self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone, Copy)]
struct PageRecord {
    id: ObjectId,
    size: PageSize,
    left: f32,
    top: f32,
}

impl PageRecord {
    fn to_pdf(self, point: PagePoint) -> (f32, f32) {
        (self.left + point.x, self.top - point.y)
    }
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    document: Document,
    pages: Vec<PageRecord>,
    fonts: HashSet<(ObjectId, Vec<u8>)>,
}

impl DocumentRecord {
    fn page(&self, page_index: u32) -> Result<PageRecord, PdfEngineError> {
        self.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }

    fn ensure_font(&mut self, page_id: ObjectId, base_font: &str) -> Result<Vec<u8>, PdfEngineError> {
        let key = font_resource_key(base_font);
        if self.fonts.contains(&(page_id, key.clone())) {
            return Ok(key);
        }

        let font_id = self.document.add_object(font_dictionary(base_font));
        inherit_resources(&mut self.document, page_id)?;

        let fonts_ref = match self.document.get_or_create_resources(page_id)?.as_dict()?.get(b"Font")
        {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };

        match fonts_ref {
            Some(id) => self.document.get_object_mut(id)?.as_dict_mut()?.set(key.clone(), font_id),
            None => {
                let resources = self.document.get_or_create_resources(page_id)?.as_dict_mut()?;
                if matches!(resources.get(b"Font"), Ok(Object::Dictionary(_))) {
                    if let Ok(Object::Dictionary(fonts)) = resources.get_mut(b"Font") {
                        fonts.set(key.clone(), font_id);
                    }
                } else {
                    resources.set("Font", dictionary! { key.clone() => font_id });
                }
            }
        }

        self.fonts.insert((page_id, key.clone()));
        Ok(key)
    }

    fn append(&mut self, page_id: ObjectId, operations: Vec<Operation>) -> Result<(), PdfEngineError> {
        let bytes = Content { operations }.encode()?;
        self.document.add_page_contents(page_id, bytes)?;
        Ok(())
    }
}

/// Default backend: parses and edits documents with lopdf.
///
/// Rasterization produces blank pages of the correct geometry (white with a
/// light border); enable the `pdfium` feature for real page content.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_pages(document: &Document) -> Result<Vec<PageRecord>, PdfEngineError> {
        let mut pages = Vec::new();

        for (_, page_id) in document.get_pages() {
            let (x0, y0, x1, y1) =
                inherited_media_box(document, page_id).unwrap_or((0.0, 0.0, 612.0, 792.0));

            pages.push(PageRecord {
                id: page_id,
                size: PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() },
                left: x0.min(x1),
                top: y0.max(y1),
            });
        }

        if pages.is_empty() {
            return Err(PdfEngineError::Empty);
        }

        Ok(pages)
    }

    fn insert(&mut self, record: DocumentRecord) -> DocumentHandle {
        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, record);
        handle
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn record_mut(&mut self, handle: DocumentHandle) -> Result<&mut DocumentRecord, PdfEngineError> {
        self.docs.get_mut(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    #[cfg(feature = "pdfium")]
    fn document_bytes(&self, handle: DocumentHandle) -> Result<Vec<u8>, PdfEngineError> {
        let mut document = self.record(handle)?.document.clone();
        let mut bytes = Vec::new();
        document.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let document = Document::load_mem(&bytes).map_err(PdfEngineError::NotAPdf)?;
        let pages = Self::parse_pages(&document)?;

        tracing::debug!(pages = pages.len(), bytes = bytes.len(), "opened document");
        Ok(self.insert(DocumentRecord { document, pages, fonts: HashSet::new() }))
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.pages.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        Ok(self.record(handle)?.page(page_index)?.size)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
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
        let record = self.record_mut(handle)?;
        let page = record.page(page_index)?;
        let (x1, y1) = page.to_pdf(from);
        let (x2, y2) = page.to_pdf(to);

        record.append(
            page.id,
            vec![
                Operation::new("q", vec![]),
                Operation::new("RG", color_operands(color)),
                Operation::new("w", vec![Object::from(width)]),
                Operation::new("J", vec![Object::Integer(1)]),
                Operation::new("m", vec![Object::from(x1), Object::from(y1)]),
                Operation::new("l", vec![Object::from(x2), Object::from(y2)]),
                Operation::new("S", vec![]),
                Operation::new("Q", vec![]),
            ],
        )
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
        let record = self.record_mut(handle)?;
        let page = record.page(page_index)?;
        let (x, y) = page.to_pdf(at);

        let (base_font, encoded) = encode_text(text, font_name);
        let resource = record.ensure_font(page.id, base_font)?;

        record.append(
            page.id,
            vec![
                Operation::new("q", vec![]),
                Operation::new("rg", color_operands(color)),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(resource), Object::from(font_size)]),
                Operation::new("Td", vec![Object::from(x), Object::from(y)]),
                Operation::new("Tj", vec![Object::String(encoded, StringFormat::Literal)]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        )
    }

    fn duplicate(&mut self, handle: DocumentHandle) -> Result<DocumentHandle, PdfEngineError> {
        let record = self.record(handle)?.clone();
        Ok(self.insert(record))
    }

    fn save(&mut self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError> {
        let record = self.record_mut(handle)?;
        let mut bytes = Vec::new();
        record.document.save_to(&mut bytes)?;

        write_atomically(path, &bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved document");
        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

fn color_operands(color: NormalizedColor) -> Vec<Object> {
    color.iter().map(|channel| Object::from(*channel)).collect()
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Walks the page tree upwards until a MediaBox is found.
fn inherited_media_box(document: &Document, page_id: ObjectId) -> Option<(f32, f32, f32, f32)> {
    let mut current = document.get_dictionary(page_id).ok()?;

    for _ in 0..32 {
        if let Some(array) =
            current.get(b"MediaBox").ok().and_then(|obj| resolve(document, obj)).and_then(|obj| obj.as_array().ok())
        {
            if array.len() != 4 {
                return None;
            }
            let x0 = array[0].as_float().ok()?;
            let y0 = array[1].as_float().ok()?;
            let x1 = array[2].as_float().ok()?;
            let y1 = array[3].as_float().ok()?;
            return Some((x0, y0, x1, y1));
        }

        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = document.get_dictionary(parent).ok()?;
    }

    None
}

/// Copies resources a page inherits from its ancestors onto the page itself so
/// that adding a font does not shadow them.
fn inherit_resources(document: &mut Document, page_id: ObjectId) -> Result<(), PdfEngineError> {
    let page = document.get_dictionary(page_id)?;
    if page.has(b"Resources") {
        return Ok(());
    }

    let mut inherited = None;
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..32 {
        let Some(parent_id) = parent else {
            break;
        };
        let dict = document.get_dictionary(parent_id)?;
        if let Some(resources) = dict.get(b"Resources").ok().and_then(|obj| resolve(document, obj)) {
            inherited = Some(resources.clone());
            break;
        }
        parent = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    if let Some(resources) = inherited {
        document.get_object_mut(page_id)?.as_dict_mut()?.set("Resources", resources);
    }

    Ok(())
}

fn font_resource_key(base_font: &str) -> Vec<u8> {
    let mut key = b"Ov".to_vec();
    key.extend(base_font.bytes().filter(u8::is_ascii_alphanumeric));
    key
}

fn font_dictionary(base_font: &str) -> lopdf::Dictionary {
    let mut font = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
    };
    if base_font != DINGBATS_FONT {
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    }
    font
}

const DINGBATS_FONT: &str = "ZapfDingbats";

fn dingbat_code(ch: char) -> Option<u8> {
    match ch {
        '✓' => Some(0x33),
        '✔' => Some(0x34),
        '✕' => Some(0x35),
        '✖' => Some(0x36),
        '✗' => Some(0x37),
        '✘' => Some(0x38),
        _ => None,
    }
}

/// Picks the font a string can be shown with and encodes it for that font.
///
/// Check and ballot glyphs go through ZapfDingbats; everything else is
/// encoded as Latin-1 for the requested standard font, with `?` for
/// characters it cannot show.
fn encode_text<'a>(text: &str, font_name: &'a str) -> (&'a str, Vec<u8>) {
    if !text.is_empty() {
        if let Some(codes) = text.chars().map(dingbat_code).collect::<Option<Vec<u8>>>() {
            return (DINGBATS_FONT, codes);
        }
    }

    let bytes = text
        .chars()
        .map(|ch| match u32::from(ch) {
            code @ 0x20..=0x7e | code @ 0xa0..=0xff => code as u8,
            _ => b'?',
        })
        .collect();

    (font_name, bytes)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PdfEngineError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Rasterizes with a system pdfium library; edits and saving stay on lopdf.
    pub struct PdfiumEngine {
        pdfium: Pdfium,
        inner: LopdfEngine,
    }

    impl PdfiumEngine {
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                PdfEngineError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self { pdfium: Pdfium::new(bindings), inner: LopdfEngine::default() })
        }
    }

    fn backend(err: PdfiumError) -> PdfEngineError {
        PdfEngineError::Backend(err.to_string())
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            self.inner.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            self.inner.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, PdfEngineError> {
            let page_count = self.inner.page_count(handle)?;
            let out_of_range =
                || PdfEngineError::PageOutOfRange { page: request.page_index, page_count };
            if request.page_index >= page_count {
                return Err(out_of_range());
            }

            let bytes = self.inner.document_bytes(handle)?;
            let document = self.pdfium.load_pdf_from_byte_slice(&bytes, None).map_err(backend)?;
            let index = request.page_index.try_into().map_err(|_| out_of_range())?;
            let page = document.pages().get(index).map_err(backend)?;

            let scale = if request.scale <= 0.0 { 1.0 } else { request.scale };
            let config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let rendered = page.render_with_config(&config).map_err(backend)?.as_image().to_rgba8();

            RgbaImage::from_raw(rendered.width(), rendered.height(), rendered.into_raw())
                .ok_or_else(|| PdfEngineError::Backend("pdfium returned a short bitmap".to_owned()))
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
            self.inner.draw_line(handle, page_index, from, to, color, width)
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
            self.inner.insert_text(handle, page_index, at, text, font_name, font_size, color)
        }

        fn duplicate(&mut self, handle: DocumentHandle) -> Result<DocumentHandle, PdfEngineError> {
            self.inner.duplicate(handle)
        }

        fn save(&mut self, handle: DocumentHandle, path: &Path) -> Result<(), PdfEngineError> {
            self.inner.save(handle, path)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.inner.close(handle)
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
