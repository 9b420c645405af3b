//! Overlay configuration.
//!
//! Defaults reproduce the behaviour users know from the desktop annotator:
//! zoom from 50% to 300% in 20% steps, 15 px mark/note and 5 px stroke hit
//! radii, 20 pt marks and 15 pt notes on screen, 12 pt Helvetica when baked.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub initial: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self { min: 0.5, max: 3.0, step: 0.2, initial: 1.0 }
    }
}

impl ZoomConfig {
    /// Clamps into `[min, max]`, rounding away accumulated step drift.
    pub fn clamp(&self, zoom: f32) -> f32 {
        ((zoom * 1000.0).round() / 1000.0).clamp(self.min, self.max)
    }
}

/// Configuration for the overlay engine and its view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub zoom: ZoomConfig,
    /// Screen-pixel hit radius for marks and notes
    pub point_tolerance_px: f32,
    /// Screen-pixel hit radius for strokes
    pub stroke_tolerance_px: f32,
    /// On-screen glyph size of marks at zoom 1.0
    pub mark_font_size: f32,
    /// On-screen text size of new notes at zoom 1.0
    pub note_font_size: f32,
    /// Stroke width, on screen and baked
    pub stroke_width: f32,
    /// Font family handed to the view layer
    pub display_font: String,
    /// Standard PDF font used when baking marks and notes
    pub bake_font: String,
    /// Point size used when baking marks and notes
    pub bake_font_size: f32,
    /// View pixels scrolled per wheel notch
    pub scroll_unit_px: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomConfig::default(),
            point_tolerance_px: 15.0,
            stroke_tolerance_px: 5.0,
            mark_font_size: 20.0,
            note_font_size: 15.0,
            stroke_width: 2.0,
            display_font: "Arial".to_string(),
            bake_font: "Helvetica".to_string(),
            bake_font_size: 12.0,
            scroll_unit_px: 40.0,
        }
    }
}

impl OverlayConfig {
    /// Checks the values are usable.
    ///
    /// # Errors
    /// Returns the name of the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zoom = &self.zoom;
        if !(zoom.min > 0.0 && zoom.min <= zoom.max) {
            return Err(ConfigError::InvalidValue("zoom.min/zoom.max".to_string()));
        }
        if !(zoom.step > 0.0) {
            return Err(ConfigError::InvalidValue("zoom.step".to_string()));
        }
        if !(zoom.min..=zoom.max).contains(&zoom.initial) {
            return Err(ConfigError::InvalidValue("zoom.initial".to_string()));
        }

        let positive = [
            ("point_tolerance_px", self.point_tolerance_px),
            ("stroke_tolerance_px", self.stroke_tolerance_px),
            ("mark_font_size", self.mark_font_size),
            ("note_font_size", self.note_font_size),
            ("stroke_width", self.stroke_width),
            ("bake_font_size", self.bake_font_size),
            ("scroll_unit_px", self.scroll_unit_px),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| !(*value > 0.0)) {
            return Err(ConfigError::InvalidValue((*name).to_string()));
        }

        if self.bake_font.trim().is_empty() {
            return Err(ConfigError::InvalidValue("bake_font".to_string()));
        }

        Ok(())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration option
    #[error("invalid value for {0}")]
    InvalidValue(String),
}
