//! Annotation overlay engine
//!
//! Keeps a zoom-independent, page-aware model of user markup consistent with a
//! zoomable, vertically stacked raster view of a document, and bakes that
//! markup into the document through a [`pdf_engine::PdfEngine`] on save.

pub mod annotation;
pub mod color;
pub mod config;
pub mod error;
pub mod mapping;
pub mod projector;
pub mod render;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use annotation::{Annotation, AnnotationId, AnnotationKind, DocPoint, Glyph};
pub use color::{DisplayColor, PaletteColor, UnknownColor};
pub use config::{ConfigError, OverlayConfig, ZoomConfig};
pub use error::{DocumentOpenError, OverlayError, RenderError, SaveError};
pub use hit_test::Tolerance;
pub use mapping::{PageLayout, ViewPoint};
pub use render::{DisplayItem, DisplayList, RenderPipeline, Surface, Visual, VisualId};
pub use session::{
    apply_session_action, AnnotatorSession, CursorHint, SessionAction, SessionState, TextPrompt,
    Tool, UnknownTool,
};
pub use store::AnnotationStore;
