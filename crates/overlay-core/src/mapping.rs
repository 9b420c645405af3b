//! Document space ⇄ view space mapping
//!
//! A [`PageLayout`] is the offset table for one render pass: the zoom factor
//! and every page's rendered size, with cumulative top offsets computed once.
//! It answers "which page is this point on" for both drawing and hit-testing
//! until the next pass replaces it.

use crate::annotation::DocPoint;
use pdf_engine::PageSize;
use serde::Serialize;

/// Pixel coordinate on the zoomed, vertically stacked raster strip
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewPoint {
    pub x: f32,
    pub y: f32,
}

impl ViewPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    zoom: f32,
    page_widths: Vec<f32>,
    page_heights: Vec<f32>,
    page_tops: Vec<f32>,
    total_height: f32,
}

impl PageLayout {
    /// Builds the table from page sizes already expressed in view pixels at `zoom`.
    pub fn new(zoom: f32, page_sizes: &[(f32, f32)]) -> Self {
        let mut page_tops = Vec::with_capacity(page_sizes.len());
        let mut cursor = 0.0;

        for (_, height) in page_sizes {
            page_tops.push(cursor);
            cursor += height;
        }

        Self {
            zoom,
            page_widths: page_sizes.iter().map(|(width, _)| *width).collect(),
            page_heights: page_sizes.iter().map(|(_, height)| *height).collect(),
            page_tops,
            total_height: cursor,
        }
    }

    /// Lays out pages of the given point sizes at `zoom`, without rounding to
    /// whole pixels, so `view / zoom` is always in page points.
    pub fn scaled(zoom: f32, page_sizes: &[PageSize]) -> Self {
        let sizes: Vec<(f32, f32)> =
            page_sizes.iter().map(|size| (size.width_pt * zoom, size.height_pt * zoom)).collect();
        Self::new(zoom, &sizes)
    }

    /// The layout at zoom 1.0, where view pixels and page points coincide.
    pub fn unit(page_sizes: &[PageSize]) -> Self {
        Self::scaled(1.0, page_sizes)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn page_count(&self) -> usize {
        self.page_heights.len()
    }

    pub fn page_top(&self, page_index: usize) -> Option<f32> {
        self.page_tops.get(page_index).copied()
    }

    pub fn page_height(&self, page_index: usize) -> Option<f32> {
        self.page_heights.get(page_index).copied()
    }

    /// Scrollable extent: the widest page by the stacked height.
    pub fn content_bounds(&self) -> (f32, f32) {
        let width = self.page_widths.iter().copied().fold(0.0, f32::max);
        (width, self.total_height)
    }

    /// Page whose half-open span `[top, top + height)` contains `view_y`.
    ///
    /// Points above the strip (or any point of an empty document) resolve to
    /// page 0; points below the last page resolve to the last page.
    pub fn page_at_view_y(&self, view_y: f32) -> usize {
        if self.page_heights.is_empty() || view_y < 0.0 {
            return 0;
        }

        for (index, (top, height)) in self.page_tops.iter().zip(&self.page_heights).enumerate() {
            if view_y < top + height {
                return index;
            }
        }

        self.page_heights.len() - 1
    }

    /// Undoes the zoom. The returned y stays global; only the page is resolved.
    pub fn to_document(&self, point: ViewPoint) -> (DocPoint, usize) {
        let page_index = self.page_at_view_y(point.y);
        (DocPoint::new(point.x / self.zoom, point.y / self.zoom), page_index)
    }

    pub fn to_view(&self, point: DocPoint) -> ViewPoint {
        ViewPoint::new(point.x * self.zoom, point.y * self.zoom)
    }

    /// Converts an on-screen distance into document units at this zoom.
    pub fn doc_tolerance(&self, screen_px: f32) -> f32 {
        screen_px / self.zoom
    }
}
