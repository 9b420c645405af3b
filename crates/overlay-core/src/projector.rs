//! Persistence projector
//!
//! Bakes overlay annotations into the document through the engine's native
//! drawing primitives. Baking happens on a duplicate of the open document, so
//! the live document never carries half-applied or repeated markup and a
//! failed save can simply be retried.

use crate::annotation::{Annotation, AnnotationKind, DocPoint};
use crate::config::OverlayConfig;
use crate::error::SaveError;
use crate::mapping::PageLayout;
use crate::store::AnnotationStore;
use pdf_engine::{DocumentHandle, PagePoint, PdfEngine, PdfEngineError};
use std::path::Path;

/// Returns a new document handle carrying every annotation in `store`.
///
/// On failure the duplicate is closed again and `handle` is left untouched.
pub fn project<E: PdfEngine + ?Sized>(
    store: &AnnotationStore,
    engine: &mut E,
    handle: DocumentHandle,
    config: &OverlayConfig,
) -> Result<DocumentHandle, SaveError> {
    let page_count = engine.page_count(handle).map_err(SaveError::Prepare)?;
    let page_sizes = (0..page_count)
        .map(|page_index| engine.page_size(handle, page_index))
        .collect::<Result<Vec<_>, _>>()
        .map_err(SaveError::Prepare)?;
    let unit = PageLayout::unit(&page_sizes);

    let baked = engine.duplicate(handle).map_err(SaveError::Prepare)?;

    for annotation in store.iter() {
        if let Err(source) = bake(engine, baked, &unit, annotation, config) {
            discard(engine, baked);
            return Err(SaveError::Bake { page: annotation.page_index(), source });
        }
    }

    Ok(baked)
}

/// Projects `store` onto a copy of `handle` and writes it to `path`.
pub fn save<E: PdfEngine + ?Sized>(
    store: &AnnotationStore,
    engine: &mut E,
    handle: DocumentHandle,
    path: &Path,
    config: &OverlayConfig,
) -> Result<(), SaveError> {
    let baked = project(store, engine, handle, config)?;

    let result = engine
        .save(baked, path)
        .map_err(|source| SaveError::Write { path: path.to_path_buf(), source });
    discard(engine, baked);

    if result.is_ok() {
        tracing::info!(path = %path.display(), annotations = store.len(), "baked annotations");
    }
    result
}

fn discard<E: PdfEngine + ?Sized>(engine: &mut E, baked: DocumentHandle) {
    if let Err(err) = engine.close(baked) {
        tracing::warn!(handle = baked.raw(), "failed to close baked copy: {err}");
    }
}

fn bake<E: PdfEngine + ?Sized>(
    engine: &mut E,
    handle: DocumentHandle,
    unit: &PageLayout,
    annotation: &Annotation,
    config: &OverlayConfig,
) -> Result<(), PdfEngineError> {
    let page_index = annotation.page_index();
    let page = page_index as u32;
    let top = unit.page_top(page_index).ok_or(PdfEngineError::PageOutOfRange {
        page,
        page_count: unit.page_count() as u32,
    })?;
    // Stored y is global across the stacked pages; the engine wants it page local.
    let local = |point: DocPoint| PagePoint::new(point.x, point.y - top);
    let color = annotation.color().normalized();

    match annotation.kind() {
        AnnotationKind::Stroke { from, to } => {
            engine.draw_line(handle, page, local(*from), local(*to), color, config.stroke_width)
        }
        AnnotationKind::Mark { position, glyph } => engine.insert_text(
            handle,
            page,
            local(*position),
            glyph.symbol(),
            &config.bake_font,
            config.bake_font_size,
            color,
        ),
        AnnotationKind::Note { position, text, .. } => engine.insert_text(
            handle,
            page,
            local(*position),
            text,
            &config.bake_font,
            config.bake_font_size,
            color,
        ),
    }
}
