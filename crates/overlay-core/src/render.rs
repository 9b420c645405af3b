//! Render/rehydrate pipeline
//!
//! Every pass re-rasterizes all pages at the current zoom, stacks them, and
//! redraws each annotation at its re-projected view position. Passes are
//! idempotent: the surface is cleared first, and the annotation → visual map
//! is rebuilt from scratch.

use crate::annotation::{Annotation, AnnotationId, AnnotationKind};
use crate::color::DisplayColor;
use crate::config::OverlayConfig;
use crate::error::RenderError;
use crate::mapping::{PageLayout, ViewPoint};
use crate::store::AnnotationStore;
use pdf_engine::{DocumentHandle, PdfEngine, RenderRequest, RgbaImage};
use serde::Serialize;
use std::collections::HashMap;

/// Identifier the view layer assigns to each drawn element
pub type VisualId = u64;

/// The drawing side of the windowing layer.
///
/// Text is positioned by its baseline origin, the same anchor the document
/// engine uses when the text is baked.
pub trait Surface {
    /// Discards every element drawn so far.
    fn clear(&mut self);
    fn place_page(&mut self, page_index: usize, top: f32, raster: &RgbaImage) -> VisualId;
    fn draw_line(
        &mut self,
        from: ViewPoint,
        to: ViewPoint,
        color: DisplayColor,
        width: f32,
    ) -> VisualId;
    fn draw_text(
        &mut self,
        at: ViewPoint,
        text: &str,
        font: &str,
        size: u32,
        color: DisplayColor,
    ) -> VisualId;
    fn set_content_bounds(&mut self, width: f32, height: f32);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "visual", rename_all = "snake_case")]
pub enum Visual {
    Page { page_index: usize, top: f32, width: u32, height: u32 },
    Line { from: ViewPoint, to: ViewPoint, color: DisplayColor, width: f32 },
    Text { at: ViewPoint, text: String, font: String, size: u32, color: DisplayColor },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayItem {
    pub id: VisualId,
    #[serde(flatten)]
    pub visual: Visual,
}

/// A [`Surface`] that records what was drawn instead of painting it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisplayList {
    #[serde(skip)]
    next_id: VisualId,
    items: Vec<DisplayItem>,
    content_bounds: (f32, f32),
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[DisplayItem] {
        &self.items
    }

    pub fn get(&self, id: VisualId) -> Option<&Visual> {
        self.items.iter().find(|item| item.id == id).map(|item| &item.visual)
    }

    pub fn content_bounds(&self) -> (f32, f32) {
        self.content_bounds
    }

    fn push(&mut self, visual: Visual) -> VisualId {
        self.next_id += 1;
        self.items.push(DisplayItem { id: self.next_id, visual });
        self.next_id
    }
}

impl Surface for DisplayList {
    fn clear(&mut self) {
        self.items.clear();
        self.content_bounds = (0.0, 0.0);
    }

    fn place_page(&mut self, page_index: usize, top: f32, raster: &RgbaImage) -> VisualId {
        self.push(Visual::Page { page_index, top, width: raster.width(), height: raster.height() })
    }

    fn draw_line(
        &mut self,
        from: ViewPoint,
        to: ViewPoint,
        color: DisplayColor,
        width: f32,
    ) -> VisualId {
        self.push(Visual::Line { from, to, color, width })
    }

    fn draw_text(
        &mut self,
        at: ViewPoint,
        text: &str,
        font: &str,
        size: u32,
        color: DisplayColor,
    ) -> VisualId {
        self.push(Visual::Text {
            at,
            text: text.to_owned(),
            font: font.to_owned(),
            size,
            color,
        })
    }

    fn set_content_bounds(&mut self, width: f32, height: f32) {
        self.content_bounds = (width, height);
    }
}

/// Owns the view projection state: the layout of the last successful pass and
/// which visual each annotation was drawn as.
#[derive(Debug, Default)]
pub struct RenderPipeline {
    layout: Option<PageLayout>,
    visuals: HashMap<AnnotationId, VisualId>,
}

impl RenderPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layout of the last successful pass, if any.
    pub fn layout(&self) -> Option<&PageLayout> {
        self.layout.as_ref()
    }

    pub fn visual_for(&self, id: AnnotationId) -> Option<VisualId> {
        self.visuals.get(&id).copied()
    }

    /// Runs one full pass.
    ///
    /// All pages are rasterized before the surface is touched, so a page that
    /// fails to render leaves both the surface and the cached layout as they
    /// were and the failure is returned.
    pub fn render<E, S>(
        &mut self,
        engine: &E,
        handle: DocumentHandle,
        zoom: f32,
        store: &AnnotationStore,
        config: &OverlayConfig,
        surface: &mut S,
    ) -> Result<&PageLayout, RenderError>
    where
        E: PdfEngine + ?Sized,
        S: Surface + ?Sized,
    {
        let page_count = engine.page_count(handle).map_err(RenderError::Layout)?;

        let mut rasters = Vec::with_capacity(page_count as usize);
        let mut sizes = Vec::with_capacity(page_count as usize);
        for page_index in 0..page_count {
            sizes.push(engine.page_size(handle, page_index).map_err(RenderError::Layout)?);
            let raster = engine
                .render_page(handle, RenderRequest { page_index, scale: zoom })
                .map_err(|source| RenderError::Page { page: page_index, source })?;
            rasters.push(raster);
        }

        // Offsets come from page points, not whole-pixel raster sizes.
        let layout = PageLayout::scaled(zoom, &sizes);

        surface.clear();
        for (page_index, raster) in rasters.iter().enumerate() {
            let top = layout.page_top(page_index).unwrap_or_default();
            surface.place_page(page_index, top, raster);
        }

        let (width, height) = layout.content_bounds();
        surface.set_content_bounds(width, height);

        self.visuals.clear();
        for annotation in store.iter() {
            let visual = draw_annotation(surface, &layout, annotation, config);
            self.visuals.insert(annotation.id(), visual);
        }

        tracing::debug!(
            pages = page_count,
            annotations = store.len(),
            zoom,
            height,
            "render pass complete"
        );

        Ok(&*self.layout.insert(layout))
    }
}

/// `anchor_size * zoom`, truncated, never below 1.
fn scaled_font_size(anchor_size: f32, zoom: f32) -> u32 {
    ((anchor_size * zoom) as u32).max(1)
}

fn draw_annotation<S: Surface + ?Sized>(
    surface: &mut S,
    layout: &PageLayout,
    annotation: &Annotation,
    config: &OverlayConfig,
) -> VisualId {
    let color = annotation.color().display();

    match annotation.kind() {
        AnnotationKind::Stroke { from, to } => {
            surface.draw_line(layout.to_view(*from), layout.to_view(*to), color, config.stroke_width)
        }
        AnnotationKind::Mark { position, glyph } => surface.draw_text(
            layout.to_view(*position),
            glyph.symbol(),
            &config.display_font,
            scaled_font_size(config.mark_font_size, layout.zoom()),
            color,
        ),
        AnnotationKind::Note { position, text, font_size_at_unit_zoom } => surface.draw_text(
            layout.to_view(*position),
            text,
            &config.display_font,
            scaled_font_size(*font_size_at_unit_zoom, layout.zoom()),
            color,
        ),
    }
}
