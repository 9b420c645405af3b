//! Event processing for one annotating session.
//!
//! [`SessionState`] holds the interaction state (tool, colour, zoom, scroll
//! position, stroke anchor) and changes only through [`apply_session_action`].
//! [`AnnotatorSession`] is the single owner of the engine, the open document,
//! the annotation store and the render pipeline; every pointer, zoom and save
//! event goes through it.

use crate::annotation::{Annotation, DocPoint, Glyph};
use crate::color::PaletteColor;
use crate::config::OverlayConfig;
use crate::error::{DocumentOpenError, OverlayError, SaveError};
use crate::hit_test::{self, Tolerance};
use crate::mapping::{PageLayout, ViewPoint};
use crate::projector;
use crate::render::{RenderPipeline, Surface};
use crate::store::AnnotationStore;
use pdf_engine::{DocumentHandle, OpenSource, PdfEngine};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Active tool; selecting one deselects the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    None,
    Mark(Glyph),
    Note,
    Stroke,
    Erase,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::None => "none",
            Tool::Mark(Glyph::Tick) => "tick",
            Tool::Mark(Glyph::Cross) => "cross",
            Tool::Note => "note",
            Tool::Stroke => "stroke",
            Tool::Erase => "erase",
        }
    }

    pub fn cursor(self) -> CursorHint {
        match self {
            Tool::Erase => CursorHint::Circle,
            _ => CursorHint::Arrow,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool {0:?} (expected none, tick, cross, note, stroke or erase)")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Tool::None),
            "tick" => Ok(Tool::Mark(Glyph::Tick)),
            "cross" => Ok(Tool::Mark(Glyph::Cross)),
            "note" | "text" => Ok(Tool::Note),
            "stroke" | "pen" => Ok(Tool::Stroke),
            "erase" => Ok(Tool::Erase),
            _ => Err(UnknownTool(value.to_owned())),
        }
    }
}

/// Pointer shape the windowing layer should show for the active tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorHint {
    Arrow,
    Circle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub tool: Tool,
    pub color: PaletteColor,
    pub zoom: f32,
    /// Vertical scroll position in view pixels
    pub scroll_offset: f32,
    /// Visible height of the widget in view pixels; zero until the view reports it
    pub viewport_height: f32,
    /// Last sampled point of the stroke being drawn
    pub last_point: Option<DocPoint>,
}

impl SessionState {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            tool: Tool::None,
            color: PaletteColor::default(),
            zoom: config.zoom.clamp(config.zoom.initial),
            scroll_offset: 0.0,
            viewport_height: 0.0,
            last_point: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionAction {
    SelectTool(Tool),
    SelectColor(PaletteColor),
    ZoomIn,
    ZoomOut,
    SetZoom(f32),
    /// Wheel delta in the platform's 120-per-notch units
    Scroll { delta: f32, content_height: f32 },
    Resize { viewport_height: f32, content_height: f32 },
    ReleasePointer,
}

/// Applies one state transition. Returns `true` when the zoom changed and the
/// view needs a new render pass.
pub fn apply_session_action(
    state: &mut SessionState,
    action: SessionAction,
    config: &OverlayConfig,
) -> bool {
    match action {
        SessionAction::SelectTool(tool) => {
            state.tool = tool;
            state.last_point = None;
            false
        }
        SessionAction::SelectColor(color) => {
            state.color = color;
            false
        }
        SessionAction::ZoomIn => set_zoom(state, state.zoom + config.zoom.step, config),
        SessionAction::ZoomOut => set_zoom(state, state.zoom - config.zoom.step, config),
        SessionAction::SetZoom(zoom) => set_zoom(state, zoom, config),
        SessionAction::Scroll { delta, content_height } => {
            let notches = -(delta / 120.0).trunc();
            state.scroll_offset = (state.scroll_offset + notches * config.scroll_unit_px)
                .clamp(0.0, max_scroll(content_height, state.viewport_height));
            false
        }
        SessionAction::Resize { viewport_height, content_height } => {
            state.viewport_height = viewport_height.max(0.0);
            state.scroll_offset =
                state.scroll_offset.clamp(0.0, max_scroll(content_height, state.viewport_height));
            false
        }
        SessionAction::ReleasePointer => {
            state.last_point = None;
            false
        }
    }
}

/// Furthest scroll position that still keeps the last page's bottom in view.
fn max_scroll(content_height: f32, viewport_height: f32) -> f32 {
    (content_height - viewport_height).max(0.0)
}

fn set_zoom(state: &mut SessionState, zoom: f32, config: &OverlayConfig) -> bool {
    let zoom = config.zoom.clamp(zoom);
    if zoom == state.zoom {
        return false;
    }
    state.zoom = zoom;
    true
}

/// Modal text input supplied by the windowing layer.
pub trait TextPrompt {
    /// `None` means the user cancelled.
    fn ask(&mut self, title: &str, initial: Option<&str>) -> Option<String>;
}

pub struct AnnotatorSession<E: PdfEngine, S: Surface> {
    engine: E,
    surface: S,
    config: OverlayConfig,
    document: Option<(DocumentHandle, PathBuf)>,
    store: AnnotationStore,
    pipeline: RenderPipeline,
    state: SessionState,
}

impl<E: PdfEngine, S: Surface> AnnotatorSession<E, S> {
    pub fn new(engine: E, surface: S, config: OverlayConfig) -> Self {
        let state = SessionState::new(&config);
        Self {
            engine,
            surface,
            config,
            document: None,
            store: AnnotationStore::new(),
            pipeline: RenderPipeline::new(),
            state,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn layout(&self) -> Option<&PageLayout> {
        self.pipeline.layout()
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document.as_ref().map(|(_, path)| path.as_path())
    }

    pub fn cursor(&self) -> CursorHint {
        self.state.tool.cursor()
    }

    /// Opens and renders a new document, replacing the current one.
    ///
    /// Annotations are reset only once the new document has rendered; on any
    /// failure the previous document, view and annotations stay as they were.
    pub fn open_document(&mut self, path: &Path) -> Result<(), OverlayError> {
        let handle = self
            .engine
            .open(OpenSource::from(path))
            .map_err(|source| DocumentOpenError { path: path.to_path_buf(), source })?;

        let empty = AnnotationStore::new();
        let rendered = self
            .pipeline
            .render(&self.engine, handle, self.state.zoom, &empty, &self.config, &mut self.surface)
            .map(|_| ());
        if let Err(err) = rendered {
            tracing::warn!(path = %path.display(), "initial render failed: {err}");
            self.close_quietly(handle);
            return Err(err.into());
        }

        if let Some((previous, _)) = self.document.replace((handle, path.to_path_buf())) {
            self.close_quietly(previous);
        }
        self.store.clear();
        self.state.last_point = None;
        self.state.scroll_offset = 0.0;

        tracing::info!(path = %path.display(), "document opened");
        Ok(())
    }

    pub fn select_tool(&mut self, tool: Tool) {
        apply_session_action(&mut self.state, SessionAction::SelectTool(tool), &self.config);
    }

    pub fn select_color(&mut self, color: PaletteColor) {
        apply_session_action(&mut self.state, SessionAction::SelectColor(color), &self.config);
    }

    pub fn zoom_in(&mut self) -> Result<(), OverlayError> {
        self.change_zoom(SessionAction::ZoomIn)
    }

    pub fn zoom_out(&mut self) -> Result<(), OverlayError> {
        self.change_zoom(SessionAction::ZoomOut)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), OverlayError> {
        self.change_zoom(SessionAction::SetZoom(zoom))
    }

    /// Scrolls by a wheel delta within the current content height.
    pub fn wheel(&mut self, delta: f32) {
        let content_height = self.content_height();
        apply_session_action(
            &mut self.state,
            SessionAction::Scroll { delta, content_height },
            &self.config,
        );
    }

    /// Records the visible height of the view so scrolling stops at the last page.
    pub fn set_viewport_height(&mut self, viewport_height: f32) {
        let content_height = self.content_height();
        apply_session_action(
            &mut self.state,
            SessionAction::Resize { viewport_height, content_height },
            &self.config,
        );
    }

    /// Pointer pressed at widget coordinates.
    pub fn pointer_down(
        &mut self,
        widget: ViewPoint,
        prompt: &mut dyn TextPrompt,
    ) -> Result<(), OverlayError> {
        let Some((point, page_index, tolerance)) = self.locate(widget) else {
            return Ok(());
        };

        match self.state.tool {
            Tool::None => Ok(()),
            Tool::Erase => self.erase_at(point, page_index, tolerance),
            Tool::Mark(glyph) => {
                self.store.add(Annotation::mark(page_index, point, glyph, self.state.color));
                self.rerender()
            }
            Tool::Note => self.edit_or_create_note(point, page_index, tolerance, prompt),
            Tool::Stroke => {
                self.state.last_point = Some(point);
                Ok(())
            }
        }
    }

    /// Pointer moved with the button held, at widget coordinates.
    pub fn pointer_drag(&mut self, widget: ViewPoint) -> Result<(), OverlayError> {
        let Some((point, page_index, tolerance)) = self.locate(widget) else {
            return Ok(());
        };

        match self.state.tool {
            Tool::Stroke => match self.state.last_point.replace(point) {
                Some(last) => {
                    self.store.add(Annotation::stroke(page_index, last, point, self.state.color));
                    self.rerender()
                }
                None => Ok(()),
            },
            Tool::Erase => self.erase_at(point, page_index, tolerance),
            _ => Ok(()),
        }
    }

    /// Pointer released: ends the current stroke chain.
    pub fn pointer_up(&mut self) {
        apply_session_action(&mut self.state, SessionAction::ReleasePointer, &self.config);
    }

    /// Bakes all annotations into a copy of the document and writes it to `path`.
    pub fn save(&mut self, path: &Path) -> Result<(), OverlayError> {
        let Some(handle) = self.document.as_ref().map(|(handle, _)| *handle) else {
            return Err(SaveError::NoDocument.into());
        };

        projector::save(&self.store, &mut self.engine, handle, path, &self.config)
            .map_err(|err| {
                tracing::warn!(path = %path.display(), "save failed: {err}");
                err.into()
            })
    }

    /// Re-renders the open document, if any.
    pub fn rerender(&mut self) -> Result<(), OverlayError> {
        let Some((handle, _)) = self.document.as_ref() else {
            return Ok(());
        };

        self.pipeline.render(
            &self.engine,
            *handle,
            self.state.zoom,
            &self.store,
            &self.config,
            &mut self.surface,
        )?;
        Ok(())
    }

    fn change_zoom(&mut self, action: SessionAction) -> Result<(), OverlayError> {
        let previous = self.state.zoom;
        if !apply_session_action(&mut self.state, action, &self.config) {
            return Ok(());
        }

        match self.rerender() {
            Ok(()) => {
                // Keep the same document region at the top of the view.
                self.state.scroll_offset *= self.state.zoom / previous;
                self.clamp_scroll();
                Ok(())
            }
            Err(err) => {
                // The view still shows the old zoom; keep the mapping consistent with it.
                self.state.zoom = previous;
                Err(err)
            }
        }
    }

    fn content_height(&self) -> f32 {
        self.layout().map(|layout| layout.content_bounds().1).unwrap_or(0.0)
    }

    fn clamp_scroll(&mut self) {
        let limit = max_scroll(self.content_height(), self.state.viewport_height);
        self.state.scroll_offset = self.state.scroll_offset.clamp(0.0, limit);
    }

    /// Widget coordinates to document space, using the last render pass.
    fn locate(&self, widget: ViewPoint) -> Option<(DocPoint, usize, Tolerance)> {
        self.document.as_ref()?;
        let layout = self.pipeline.layout()?;
        let view = ViewPoint::new(widget.x, widget.y + self.state.scroll_offset);
        let (point, page_index) = layout.to_document(view);
        let tolerance = Tolerance::from_screen(
            layout,
            self.config.point_tolerance_px,
            self.config.stroke_tolerance_px,
        );
        Some((point, page_index, tolerance))
    }

    fn erase_at(
        &mut self,
        point: DocPoint,
        page_index: usize,
        tolerance: Tolerance,
    ) -> Result<(), OverlayError> {
        let hits = hit_test::find_all(&self.store, page_index, point, tolerance);
        if hits.is_empty() {
            return Ok(());
        }

        let removed = self.store.remove_all(&hits);
        tracing::debug!(removed, page_index, "erased annotations");
        self.rerender()
    }

    fn edit_or_create_note(
        &mut self,
        point: DocPoint,
        page_index: usize,
        tolerance: Tolerance,
        prompt: &mut dyn TextPrompt,
    ) -> Result<(), OverlayError> {
        let existing =
            hit_test::find_topmost(&self.store, page_index, point, tolerance, Annotation::is_note);

        if let Some(id) = existing {
            let current = self.store.get(id).and_then(Annotation::text).map(str::to_owned);
            let edited = prompt.ask("Edit Text", current.as_deref()).filter(|text| !text.is_empty());
            let Some(text) = edited else {
                return Ok(());
            };
            // `id` came from a Note hit in this same call, so this only fails if
            // the store changed underneath; skip the pass in that case.
            if !self.store.update_text(id, text) {
                return Ok(());
            }
            return self.rerender();
        }

        match prompt.ask("Input Text", None) {
            Some(text) if !text.is_empty() => {
                self.store.add(Annotation::note(
                    page_index,
                    point,
                    text,
                    self.config.note_font_size,
                    self.state.color,
                ));
                self.rerender()
            }
            _ => Ok(()),
        }
    }

    fn close_quietly(&mut self, handle: DocumentHandle) {
        if let Err(err) = self.engine.close(handle) {
            tracing::warn!(handle = handle.raw(), "failed to close document: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationKind;
    use crate::render::{DisplayList, Visual};
    use crate::testing::FakeEngine;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Answers {
        replies: VecDeque<Option<String>>,
        asked: Vec<(String, Option<String>)>,
    }

    impl Answers {
        fn with(replies: &[Option<&str>]) -> Self {
            Self {
                replies: replies.iter().map(|reply| reply.map(str::to_owned)).collect(),
                asked: Vec::new(),
            }
        }
    }

    impl TextPrompt for Answers {
        fn ask(&mut self, title: &str, initial: Option<&str>) -> Option<String> {
            self.asked.push((title.to_owned(), initial.map(str::to_owned)));
            self.replies.pop_front().flatten()
        }
    }

    fn opened() -> AnnotatorSession<FakeEngine, DisplayList> {
        let mut engine = FakeEngine::default();
        engine.add_file("/doc.pdf", &[(200.0, 300.0), (200.0, 450.0)]);
        let mut session = AnnotatorSession::new(engine, DisplayList::new(), OverlayConfig::default());
        session.open_document(Path::new("/doc.pdf")).expect("document opens");
        session
    }

    fn click(session: &mut AnnotatorSession<FakeEngine, DisplayList>, x: f32, y: f32) {
        session
            .pointer_down(ViewPoint::new(x, y), &mut Answers::default())
            .expect("pointer down succeeds");
    }

    #[test]
    fn tools_parse_and_are_exclusive() {
        assert_eq!("Tick".parse::<Tool>(), Ok(Tool::Mark(Glyph::Tick)));
        assert_eq!("pen".parse::<Tool>(), Ok(Tool::Stroke));
        assert!("lasso".parse::<Tool>().is_err());

        let mut session = opened();
        session.select_tool(Tool::Erase);
        assert_eq!(session.cursor(), CursorHint::Circle);
        session.select_tool(Tool::Note);
        assert_eq!(session.state().tool, Tool::Note);
        assert_eq!(session.cursor(), CursorHint::Arrow);
    }

    #[test]
    fn zoom_steps_are_clamped() {
        let config = OverlayConfig::default();
        let mut state = SessionState::new(&config);

        for _ in 0..20 {
            apply_session_action(&mut state, SessionAction::ZoomIn, &config);
        }
        assert_eq!(state.zoom, 3.0);
        assert!(!apply_session_action(&mut state, SessionAction::ZoomIn, &config));

        apply_session_action(&mut state, SessionAction::SetZoom(0.6), &config);
        assert!(apply_session_action(&mut state, SessionAction::ZoomOut, &config));
        assert_eq!(state.zoom, 0.5);
    }

    #[test]
    fn scrolling_stays_within_content() {
        let config = OverlayConfig::default();
        let mut state = SessionState::new(&config);

        apply_session_action(&mut state, SessionAction::Scroll { delta: 120.0, content_height: 750.0 }, &config);
        assert_eq!(state.scroll_offset, 0.0);

        apply_session_action(&mut state, SessionAction::Scroll { delta: -360.0, content_height: 750.0 }, &config);
        assert_eq!(state.scroll_offset, 120.0);

        apply_session_action(&mut state, SessionAction::Scroll { delta: -12_000.0, content_height: 750.0 }, &config);
        assert_eq!(state.scroll_offset, 750.0);
    }

    #[test]
    fn scrolling_stops_once_the_last_page_fills_the_viewport() {
        let config = OverlayConfig::default();
        let mut state = SessionState::new(&config);

        apply_session_action(
            &mut state,
            SessionAction::Resize { viewport_height: 500.0, content_height: 750.0 },
            &config,
        );
        apply_session_action(&mut state, SessionAction::Scroll { delta: -12_000.0, content_height: 750.0 }, &config);
        assert_eq!(state.scroll_offset, 250.0);

        apply_session_action(
            &mut state,
            SessionAction::Resize { viewport_height: 900.0, content_height: 750.0 },
            &config,
        );
        assert_eq!(state.scroll_offset, 0.0);
    }

    #[test]
    fn zoom_keeps_the_same_region_scrolled_into_view() {
        let mut session = opened();
        session.set_viewport_height(200.0);
        session.wheel(-240.0);
        assert_eq!(session.state().scroll_offset, 80.0);

        session.set_zoom(2.0).expect("zoom");
        assert_eq!(session.state().scroll_offset, 160.0);

        session.set_zoom(0.5).expect("zoom");
        // 750 * 0.5 - 200 leaves 175 px of scroll range.
        assert_eq!(session.state().scroll_offset, 40.0);
    }

    #[test]
    fn document_position_survives_zoom_on_long_documents() {
        let mut engine = FakeEngine::default();
        engine.add_file("/long.pdf", &[(612.0, 792.0); 12]);
        let mut session = AnnotatorSession::new(engine, DisplayList::new(), OverlayConfig::default());
        session.open_document(Path::new("/long.pdf")).expect("document opens");

        session.set_zoom(0.7).expect("zoom");
        let page_top = session.layout().and_then(|layout| layout.page_top(10)).expect("page 10");
        session.select_tool(Tool::Mark(Glyph::Tick));
        click(&mut session, 100.0, page_top + 1.0);

        let mark = session.store().iter().next().cloned().expect("mark added");
        assert_eq!(mark.page_index(), 10);

        session.set_zoom(1.0).expect("zoom");
        let at = match session.pipeline().visual_for(mark.id()).and_then(|id| session.surface().get(id)) {
            Some(Visual::Text { at, .. }) => *at,
            other => panic!("expected the mark's glyph, got {other:?}"),
        };
        let layout = session.layout().expect("layout");
        assert_eq!(layout.page_at_view_y(at.y), 10);

        session.save(Path::new("/out.pdf")).expect("save succeeds");
        match &session.engine().saved[0].1[..] {
            [crate::testing::FakeOp::Text { page: 10, at: baked, .. }] => {
                assert!(baked.y >= 0.0 && baked.y < 2.0, "baked y {} outside page 10", baked.y);
            }
            ops => panic!("unexpected baked ops {ops:?}"),
        }

        session.select_tool(Tool::Erase);
        click(&mut session, at.x, at.y);
        assert!(session.store().is_empty());
    }

    #[test]
    fn mark_lands_on_the_page_under_the_pointer() {
        let mut session = opened();
        session.select_tool(Tool::Mark(Glyph::Tick));
        session.select_color(PaletteColor::Red);

        click(&mut session, 50.0, 350.0);

        let mark = session.store().iter().next().expect("mark added");
        assert_eq!(mark.page_index(), 1);
        assert_eq!(mark.color(), PaletteColor::Red);
        assert!(matches!(mark.kind(), AnnotationKind::Mark { position, .. } if *position == DocPoint::new(50.0, 350.0)));
    }

    #[test]
    fn scroll_offset_is_applied_to_pointer_positions() {
        let mut session = opened();
        session.select_tool(Tool::Mark(Glyph::Cross));

        session.wheel(-120.0);
        click(&mut session, 10.0, 280.0);

        let mark = session.store().iter().next().expect("mark added");
        assert_eq!(mark.page_index(), 1);
        assert!(matches!(mark.kind(), AnnotationKind::Mark { position, .. } if position.y == 320.0));
    }

    #[test]
    fn annotations_keep_their_document_position_across_zoom() {
        let mut session = opened();
        session.select_tool(Tool::Mark(Glyph::Tick));
        click(&mut session, 50.0, 350.0);
        let id = session.store().iter().next().map(Annotation::id).expect("mark added");

        session.zoom_in().expect("zoom in");
        session.zoom_in().expect("zoom in");

        assert_eq!(session.state().zoom, 1.4);
        let visual = session.pipeline().visual_for(id).and_then(|visual| session.surface().get(visual));
        assert!(matches!(
            visual,
            Some(Visual::Text { at, size: 28, .. }) if (at.x - 70.0).abs() < 1e-3 && (at.y - 490.0).abs() < 1e-3
        ));
        assert!(matches!(
            session.store().get(id).map(Annotation::kind),
            Some(AnnotationKind::Mark { position, .. }) if *position == DocPoint::new(50.0, 350.0)
        ));
    }

    #[test]
    fn drag_chains_stroke_segments_until_release() {
        let mut session = opened();
        session.select_tool(Tool::Stroke);

        click(&mut session, 10.0, 10.0);
        session.pointer_drag(ViewPoint::new(20.0, 20.0)).expect("drag");
        session.pointer_drag(ViewPoint::new(30.0, 30.0)).expect("drag");
        session.pointer_up();
        session.pointer_drag(ViewPoint::new(40.0, 40.0)).expect("drag");

        let segments: Vec<(DocPoint, DocPoint)> = session
            .store()
            .iter()
            .filter_map(|annotation| match annotation.kind() {
                AnnotationKind::Stroke { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            segments,
            vec![
                (DocPoint::new(10.0, 10.0), DocPoint::new(20.0, 20.0)),
                (DocPoint::new(20.0, 20.0), DocPoint::new(30.0, 30.0)),
            ]
        );
        assert_eq!(session.state().last_point, None);
    }

    #[test]
    fn erase_removes_every_match_and_is_idempotent() {
        let mut session = opened();
        session.select_tool(Tool::Mark(Glyph::Tick));
        click(&mut session, 100.0, 100.0);
        click(&mut session, 105.0, 100.0);
        click(&mut session, 180.0, 250.0);

        session.select_tool(Tool::Erase);
        click(&mut session, 102.0, 101.0);
        assert_eq!(session.store().len(), 1);

        click(&mut session, 102.0, 101.0);
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn erase_tolerance_follows_zoom() {
        let mut session = opened();
        session.select_tool(Tool::Mark(Glyph::Tick));
        click(&mut session, 100.0, 100.0);

        session.set_zoom(2.0).expect("zoom");
        session.select_tool(Tool::Erase);
        // 15 px at zoom 2 is a 7.5 unit radius in document space.
        click(&mut session, 220.0, 200.0);
        assert_eq!(session.store().len(), 1);

        click(&mut session, 212.0, 200.0);
        assert!(session.store().is_empty());
    }

    #[test]
    fn note_tool_creates_then_edits_the_nearest_note() {
        let mut session = opened();
        session.select_tool(Tool::Mark(Glyph::Cross));
        click(&mut session, 60.0, 60.0);
        session.select_tool(Tool::Note);

        let mut prompt = Answers::with(&[Some("hello"), Some("bye")]);
        session.pointer_down(ViewPoint::new(50.0, 50.0), &mut prompt).expect("create");
        session.pointer_down(ViewPoint::new(55.0, 52.0), &mut prompt).expect("edit");

        assert_eq!(
            prompt.asked,
            vec![
                ("Input Text".to_owned(), None),
                ("Edit Text".to_owned(), Some("hello".to_owned())),
            ]
        );
        let texts: Vec<&str> = session.store().iter().filter_map(Annotation::text).collect();
        assert_eq!(texts, vec!["bye"]);
        assert_eq!(session.store().len(), 2);
        assert!(session
            .surface()
            .items()
            .iter()
            .any(|item| matches!(&item.visual, Visual::Text { text, .. } if text == "bye")));
    }

    #[test]
    fn cancelled_or_empty_note_input_changes_nothing() {
        let mut session = opened();
        session.select_tool(Tool::Note);

        let mut prompt = Answers::with(&[None, Some("")]);
        session.pointer_down(ViewPoint::new(50.0, 50.0), &mut prompt).expect("cancel");
        session.pointer_down(ViewPoint::new(50.0, 50.0), &mut prompt).expect("empty");
        assert!(session.store().is_empty());

        let mut prompt = Answers::with(&[Some("keep"), Some("")]);
        session.pointer_down(ViewPoint::new(50.0, 50.0), &mut prompt).expect("create");
        session.pointer_down(ViewPoint::new(50.0, 50.0), &mut prompt).expect("empty edit");
        let texts: Vec<&str> = session.store().iter().filter_map(Annotation::text).collect();
        assert_eq!(texts, vec!["keep"]);
    }

    #[test]
    fn pointer_events_without_a_document_are_ignored() {
        let mut session =
            AnnotatorSession::new(FakeEngine::default(), DisplayList::new(), OverlayConfig::default());
        session.select_tool(Tool::Mark(Glyph::Tick));

        click(&mut session, 10.0, 10.0);
        session.pointer_drag(ViewPoint::new(20.0, 20.0)).expect("drag");

        assert!(session.store().is_empty());
        assert!(matches!(
            session.save(Path::new("/out.pdf")),
            Err(OverlayError::Save(SaveError::NoDocument))
        ));
    }

    #[test]
    fn failed_open_keeps_the_current_document() {
        let mut session = opened();
        session.engine.add_file("/broken.pdf", &[(200.0, 300.0), (200.0, 300.0), (200.0, 300.0)]);
        session.engine.fail_render_page = Some(2);
        session.select_tool(Tool::Mark(Glyph::Tick));
        click(&mut session, 10.0, 10.0);

        let missing = session.open_document(Path::new("/missing.pdf"));
        assert!(matches!(missing, Err(OverlayError::Open(_))));

        let broken = session.open_document(Path::new("/broken.pdf"));
        assert!(matches!(broken, Err(OverlayError::Render(_))));

        assert_eq!(session.document_path(), Some(Path::new("/doc.pdf")));
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.engine().open_documents(), 1);
        assert_eq!(session.layout().map(PageLayout::page_count), Some(2));
    }

    #[test]
    fn opening_a_new_document_resets_annotations() {
        let mut session = opened();
        session.engine.add_file("/other.pdf", &[(100.0, 100.0)]);
        session.select_tool(Tool::Mark(Glyph::Tick));
        click(&mut session, 10.0, 10.0);

        session.open_document(Path::new("/other.pdf")).expect("second document opens");

        assert!(session.store().is_empty());
        assert_eq!(session.document_path(), Some(Path::new("/other.pdf")));
        assert_eq!(session.engine().open_documents(), 1);
    }

    #[test]
    fn failed_zoom_render_keeps_the_previous_zoom() {
        let mut session = opened();
        session.engine.fail_render_page = Some(0);

        assert!(session.zoom_in().is_err());

        assert_eq!(session.state().zoom, 1.0);
        assert_eq!(session.layout().map(PageLayout::zoom), Some(1.0));
    }

    #[test]
    fn failed_save_keeps_annotations_and_can_be_retried() {
        let mut session = opened();
        session.select_tool(Tool::Mark(Glyph::Tick));
        click(&mut session, 10.0, 10.0);
        click(&mut session, 20.0, 400.0);
        session.engine.fail_save = true;

        assert!(session.save(Path::new("/out.pdf")).is_err());
        assert_eq!(session.store().len(), 2);

        session.engine.fail_save = false;
        session.save(Path::new("/out.pdf")).expect("retry succeeds");
        assert_eq!(session.engine().saved.len(), 1);
        assert_eq!(session.engine().saved[0].1.len(), 2);
    }
}
