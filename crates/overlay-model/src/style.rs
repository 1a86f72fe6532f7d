//! Text styling: colors, font weight, and the per-overlay style block.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;

/// An 8-bit RGBA color.
///
/// Serialized as `#rrggbb`, `#rrggbbaa`, or `transparent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully transparent colors draw nothing.
    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Alpha as a fraction in `[0, 1]`.
    pub fn alpha_f64(&self) -> f64 {
        self.a as f64 / 255.0
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl FromStr for Color {
    type Err = OverlayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("transparent") {
            return Ok(Color::TRANSPARENT);
        }

        let invalid = || OverlayError::InvalidColor {
            value: value.to_string(),
        };
        let hex = trimmed.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Ok(Color::rgb(expand(0)?, expand(1)?, expand(2)?))
            }
            6 => Ok(Color::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Ok(Color::rgba(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = OverlayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_transparent() {
            f.write_str("transparent")
        } else if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Font weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Visual style of an overlay's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font size in layout pixels.
    pub font_size: f64,

    pub font_family: String,

    pub font_weight: FontWeight,

    pub italic: bool,

    pub underline: bool,

    pub color: Color,

    /// Box painted behind the text; `transparent` disables it.
    pub background: Color,

    /// Extra advance between characters, in layout pixels.
    pub letter_spacing: f64,

    /// Line pitch as a multiple of the font size.
    pub line_height: f64,

    /// Base opacity in percent, `[0, 100]`.
    pub opacity: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 32.0,
            font_family: "sans-serif".to_string(),
            font_weight: FontWeight::Normal,
            italic: false,
            underline: false,
            color: Color::WHITE,
            background: Color::TRANSPARENT,
            letter_spacing: 0.0,
            line_height: 1.2,
            opacity: 100.0,
        }
    }
}

impl TextStyle {
    /// Base opacity as a fraction in `[0, 1]`.
    pub fn base_opacity(&self) -> f64 {
        if self.opacity.is_finite() {
            (self.opacity / 100.0).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Vertical distance between consecutive lines, in layout pixels.
    pub fn line_pitch(&self) -> f64 {
        self.font_size * self.line_height
    }

    /// Clamp opacity into range and reject sizes the renderer cannot use.
    pub fn normalize(&mut self) -> Result<(), OverlayError> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(OverlayError::InvalidStyle {
                message: format!("font size must be positive, got {}", self.font_size),
            });
        }
        if !(self.line_height.is_finite() && self.line_height > 0.0) {
            return Err(OverlayError::InvalidStyle {
                message: format!("line height must be positive, got {}", self.line_height),
            });
        }
        if !self.letter_spacing.is_finite() {
            return Err(OverlayError::InvalidStyle {
                message: "letter spacing must be finite".to_string(),
            });
        }
        self.opacity = if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 100.0)
        } else {
            100.0
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!("#ff8000".parse::<Color>().unwrap(), Color::rgb(255, 128, 0));
        assert_eq!(
            "#00000080".parse::<Color>().unwrap(),
            Color::rgba(0, 0, 0, 128)
        );
        assert_eq!(
            "Transparent".parse::<Color>().unwrap(),
            Color::TRANSPARENT
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("red".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gggggg".parse::<Color>().is_err());
    }

    #[test]
    fn test_color_serde_uses_text_form() {
        let json = serde_json::to_string(&Color::rgb(16, 32, 48)).unwrap();
        assert_eq!(json, "\"#102030\"");
        let back: Color = serde_json::from_str("\"transparent\"").unwrap();
        assert!(back.is_transparent());
    }

    #[test]
    fn test_normalize_clamps_opacity() {
        let mut style = TextStyle {
            opacity: 250.0,
            ..TextStyle::default()
        };
        style.normalize().unwrap();
        assert_eq!(style.opacity, 100.0);
        assert!((style.base_opacity() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_rejects_zero_font_size() {
        let mut style = TextStyle {
            font_size: 0.0,
            ..TextStyle::default()
        };
        assert!(style.normalize().is_err());
    }
}
