//! Text metrics for the watermark field.
//!
//! The field has to know its own rendered size before it can be placed,
//! so measurement sits behind a small trait:
//! - `ApproxMeasure`: fixed advance per character, no font needed
//! - `FontMeasure`: real glyph advances via fontdue

use std::path::Path;
use thiserror::Error;
use vwm_timing::Size;

/// Font size used for measurement when none is configured
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Average glyph advance in tenths of the font size (0.6em)
const APPROX_ADVANCE_TENTHS: f64 = 6.0;

/// Errors from loading fonts
#[derive(Debug, Error)]
pub enum TextError {
    #[error("Failed to read font: {0}")]
    Io(String),

    #[error("Invalid font: {0}")]
    InvalidFont(String),
}

/// Font size derived from the container: `base * (min side / 100) * scale`,
/// floored. `None` until the container has been laid out.
/// Computed in `f64`, grouped as written.
pub fn scaled_font_size(base: f64, scale: f64, container: Size) -> Option<f64> {
    if container.is_empty() {
        return None;
    }
    let min_side = f64::from(container.width.min(container.height));
    let size = (base * ((min_side / 100.0) * scale)).floor();
    (size.is_finite() && size > 0.0).then_some(size)
}

/// Measures rendered text
pub trait TextMeasure: Send + Sync {
    /// Size of `text` at `font_size`, rounded up to whole pixels.
    /// Lines are preserved as written.
    fn measure(&self, text: &str, font_size: f64) -> Size;
}

fn to_size(width: f64, height: f64) -> Size {
    let px = |v: f64| if v.is_finite() && v > 0.0 { v.ceil() as u32 } else { 0 };
    Size::new(px(width), px(height))
}

fn line_count(text: &str) -> usize {
    text.lines().count().max(1)
}

/// Width/height estimate without a font
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxMeasure;

impl TextMeasure for ApproxMeasure {
    fn measure(&self, text: &str, font_size: f64) -> Size {
        if text.is_empty() {
            return Size::ZERO;
        }
        let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = longest as f64 * font_size * APPROX_ADVANCE_TENTHS / 10.0;
        let height = line_count(text) as f64 * font_size;
        to_size(width, height)
    }
}

/// Glyph-accurate measurement using fontdue
pub struct FontMeasure {
    font: fontdue::Font,
}

impl FontMeasure {
    /// Parse a TrueType/OpenType font
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TextError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| TextError::InvalidFont(e.to_string()))?;
        Ok(Self { font })
    }

    /// Load a font file
    pub fn from_file(path: &Path) -> Result<Self, TextError> {
        let bytes = std::fs::read(path).map_err(|e| TextError::Io(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// fontdue works in `f32`
    fn line_width(&self, line: &str, font_size: f32) -> f32 {
        line.chars()
            .map(|c| self.font.metrics(c, font_size).advance_width)
            .sum()
    }
}

impl TextMeasure for FontMeasure {
    fn measure(&self, text: &str, font_size: f64) -> Size {
        if text.is_empty() {
            return Size::ZERO;
        }
        let font_size = font_size as f32;
        let width = text
            .lines()
            .map(|line| self.line_width(line, font_size))
            .fold(0.0_f32, f32::max);
        let line_height = self
            .font
            .horizontal_line_metrics(font_size)
            .map(|m| m.new_line_size)
            .unwrap_or(font_size);
        to_size(
            f64::from(width),
            f64::from(line_height * line_count(text) as f32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_font_size() {
        // floor(2 * (360 / 100) * 1.5) = floor(10.8)
        assert_eq!(scaled_font_size(2.0, 1.5, Size::new(640, 360)), Some(10.0));
        assert_eq!(scaled_font_size(4.0, 1.0, Size::new(1280, 720)), Some(28.0));
    }

    #[test]
    fn test_scaled_font_size_exact_products() {
        // 5 * 3.6 * 1.5 is exactly 27; single precision lands just below
        assert_eq!(scaled_font_size(5.0, 1.5, Size::new(640, 360)), Some(27.0));
        assert_eq!(scaled_font_size(5.0, 1.5, Size::new(1280, 720)), Some(54.0));
        // 2.8 * 1.5 rounds below 4.2 in double precision
        assert_eq!(scaled_font_size(5.0, 1.5, Size::new(280, 280)), Some(20.0));
    }

    #[test]
    fn test_scaled_font_size_withheld() {
        assert_eq!(scaled_font_size(2.0, 1.5, Size::ZERO), None);
        assert_eq!(scaled_font_size(2.0, 1.5, Size::new(640, 0)), None);
        // Rounds down to nothing
        assert_eq!(scaled_font_size(1.0, 0.1, Size::new(50, 50)), None);
    }

    #[test]
    fn test_approx_measure() {
        let size = ApproxMeasure.measure("Hello", 10.0);
        assert_eq!(size, Size::new(30, 10));

        let multi = ApproxMeasure.measure("ab\nabcd", 10.0);
        assert_eq!(multi, Size::new(24, 20));

        assert_eq!(ApproxMeasure.measure("", 10.0), Size::ZERO);
    }

    #[test]
    fn test_invalid_font() {
        let result = FontMeasure::from_bytes(b"not a font");
        assert!(matches!(result, Err(TextError::InvalidFont(_))));
    }

    #[test]
    fn test_missing_font_file() {
        let result = FontMeasure::from_file(Path::new("/nonexistent/font.ttf"));
        assert!(matches!(result, Err(TextError::Io(_))));
    }
}
