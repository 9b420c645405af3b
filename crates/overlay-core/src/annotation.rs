//! Annotation data model
//!
//! Every record is bound to one page and stored in document space: the view
//! coordinates divided by the zoom factor at the time of creation. The
//! vertical coordinate is global across the stacked pages, not page relative.

use crate::color::PaletteColor;
use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation
///
/// Generated using UUID v4; identity for in-place edits and removal.
pub type AnnotationId = uuid::Uuid;

/// Zoom-independent coordinate in document space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocPoint {
    pub x: f32,
    pub y: f32,
}

impl DocPoint {
    /// Create a new document-space point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point
    pub fn distance_to(&self, other: &DocPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Symbol drawn by a mark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Glyph {
    Tick,
    Cross,
}

impl Glyph {
    /// The character shown on screen and baked into the page
    pub fn symbol(self) -> &'static str {
        match self {
            Glyph::Tick => "✔",
            Glyph::Cross => "✖",
        }
    }
}

/// Geometry and content of an annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Tick or cross glyph anchored at a point
    Mark { position: DocPoint, glyph: Glyph },

    /// Free text anchored at a point
    Note {
        position: DocPoint,
        text: String,
        /// Font size on screen at zoom 1.0; scaled with the zoom when drawn
        font_size_at_unit_zoom: f32,
    },

    /// One straight piece of a free-hand line
    Stroke { from: DocPoint, to: DocPoint },
}

/// A user-authored markup record
///
/// The page index and geometry never change after creation; only a note's
/// text can be edited, through [`crate::AnnotationStore::update_text`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    id: AnnotationId,
    page_index: usize,
    color: PaletteColor,
    #[serde(flatten)]
    kind: AnnotationKind,
}

impl Annotation {
    fn new(page_index: usize, color: PaletteColor, kind: AnnotationKind) -> Self {
        Self { id: AnnotationId::new_v4(), page_index, color, kind }
    }

    pub fn mark(page_index: usize, position: DocPoint, glyph: Glyph, color: PaletteColor) -> Self {
        Self::new(page_index, color, AnnotationKind::Mark { position, glyph })
    }

    pub fn note(
        page_index: usize,
        position: DocPoint,
        text: impl Into<String>,
        font_size_at_unit_zoom: f32,
        color: PaletteColor,
    ) -> Self {
        Self::new(
            page_index,
            color,
            AnnotationKind::Note { position, text: text.into(), font_size_at_unit_zoom },
        )
    }

    pub fn stroke(page_index: usize, from: DocPoint, to: DocPoint, color: PaletteColor) -> Self {
        Self::new(page_index, color, AnnotationKind::Stroke { from, to })
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn color(&self) -> PaletteColor {
        self.color
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, AnnotationKind::Note { .. })
    }

    /// Note text, `None` for marks and strokes
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            AnnotationKind::Note { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Replaces a note's text; other kinds are left alone and report `false`.
    pub(crate) fn set_text(&mut self, new_text: String) -> bool {
        match &mut self.kind {
            AnnotationKind::Note { text, .. } => {
                *text = new_text;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_point_distance() {
        let p1 = DocPoint::new(0.0, 0.0);
        let p2 = DocPoint::new(3.0, 4.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_constructors_assign_unique_ids() {
        let a = Annotation::mark(0, DocPoint::new(1.0, 1.0), Glyph::Tick, PaletteColor::Red);
        let b = Annotation::mark(0, DocPoint::new(1.0, 1.0), Glyph::Tick, PaletteColor::Red);

        assert_ne!(a.id(), b.id());
        assert_eq!(a.page_index(), 0);
        assert_eq!(a.color(), PaletteColor::Red);
    }

    #[test]
    fn test_only_notes_accept_text() {
        let mut note = Annotation::note(1, DocPoint::new(5.0, 5.0), "draft", 15.0, PaletteColor::Black);
        let mut stroke = Annotation::stroke(
            1,
            DocPoint::new(0.0, 0.0),
            DocPoint::new(1.0, 1.0),
            PaletteColor::Black,
        );

        assert!(note.set_text("final".to_owned()));
        assert_eq!(note.text(), Some("final"));
        assert!(!stroke.set_text("ignored".to_owned()));
        assert_eq!(stroke.text(), None);
    }

    #[test]
    fn test_serializes_flat_with_kind_tag() {
        let mark = Annotation::mark(2, DocPoint::new(10.0, 20.0), Glyph::Cross, PaletteColor::Blue);
        let value = serde_json::to_value(&mark).expect("serialize");

        assert_eq!(value["kind"], "mark");
        assert_eq!(value["glyph"], "cross");
        assert_eq!(value["color"], "blue");
        assert_eq!(value["page_index"], 2);
    }
}
