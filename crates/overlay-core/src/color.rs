//! Markup palette and its two colour forms: packed 8-bit RGB for the screen
//! and per-channel floats for the document engine.

use pdf_engine::NormalizedColor;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The four colours markup can be drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteColor {
    #[default]
    Black,
    Red,
    Blue,
    Green,
}

impl PaletteColor {
    pub const ALL: [PaletteColor; 4] =
        [PaletteColor::Black, PaletteColor::Red, PaletteColor::Blue, PaletteColor::Green];

    pub fn name(self) -> &'static str {
        match self {
            PaletteColor::Black => "Black",
            PaletteColor::Red => "Red",
            PaletteColor::Blue => "Blue",
            PaletteColor::Green => "Green",
        }
    }

    pub fn display(self) -> DisplayColor {
        match self {
            PaletteColor::Black => DisplayColor::rgb(0, 0, 0),
            PaletteColor::Red => DisplayColor::rgb(255, 0, 0),
            PaletteColor::Blue => DisplayColor::rgb(0, 0, 255),
            PaletteColor::Green => DisplayColor::rgb(0, 255, 0),
        }
    }

    pub fn normalized(self) -> NormalizedColor {
        self.display().to_normalized()
    }

    /// Maps a display colour back onto the palette, if it is one of its entries.
    pub fn from_display(color: DisplayColor) -> Option<Self> {
        Self::ALL.into_iter().find(|entry| entry.display() == color)
    }
}

impl fmt::Display for PaletteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown colour {0:?} (expected black, red, blue or green)")]
pub struct UnknownColor(pub String);

impl FromStr for PaletteColor {
    type Err = UnknownColor;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|entry| entry.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| UnknownColor(value.to_owned()))
    }
}

/// Packed RGB triplet as handed to the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl DisplayColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `channel / 255.0` per channel.
    pub fn to_normalized(self) -> NormalizedColor {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }

    /// Exact inverse of [`DisplayColor::to_normalized`]; out-of-range input is clamped.
    pub fn from_normalized(color: NormalizedColor) -> Self {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { r: channel(color[0]), g: channel(color[1]), b: channel(color[2]) }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for DisplayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for DisplayColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}
