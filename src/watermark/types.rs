use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::WatermarkError;

pub const MIN_FONT_SIZE_PT: u32 = 8;
pub const MAX_FONT_SIZE_PT: u32 = 120;
pub const MIN_ROTATION_DEGREES: i32 = -180;
pub const MAX_ROTATION_DEGREES: i32 = 180;

/// RGB color of the watermark text. Transparency lives in `WatermarkStyle::opacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Pack as `0xRRGGBBAA` with a fully opaque alpha byte.
    pub fn to_packed_rgba(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, 0xFF])
    }

    /// Unpack a `0xRRGGBBAA` value. The alpha byte is ignored.
    pub fn from_packed_rgba(value: u32) -> Self {
        let [r, g, b, _] = value.to_be_bytes();
        Self::new(r, g, b)
    }

    /// Parse `#RGB` or `#RRGGBB`.
    pub fn parse_hex(hex: &str) -> Result<Self, WatermarkError> {
        let digits = hex.trim().strip_prefix('#').ok_or_else(|| {
            WatermarkError::Validation(format!("color must start with '#': {}", hex))
        })?;

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WatermarkError::Validation(format!(
                "invalid hex color: {}",
                hex
            )));
        }

        let component = |s: &str| {
            u8::from_str_radix(s, 16)
                .map_err(|_| WatermarkError::Validation(format!("invalid hex color: {}", hex)))
        };

        match digits.len() {
            3 => Ok(Self::new(
                component(&digits[0..1])? * 17,
                component(&digits[1..2])? * 17,
                component(&digits[2..3])? * 17,
            )),
            6 => Ok(Self::new(
                component(&digits[0..2])?,
                component(&digits[2..4])?,
                component(&digits[4..6])?,
            )),
            _ => Err(WatermarkError::Validation(format!(
                "color must be #RGB or #RRGGBB, got {}",
                hex
            ))),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Pixel coordinate on the image (or preview surface mapped to image space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl FromStr for Point {
    type Err = String;

    /// Parses `X,Y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| format!("invalid x coordinate in '{}'", s))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| format!("invalid y coordinate in '{}'", s))?;
        Ok(Self::new(x, y))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkStyle {
    pub text: String,
    pub font_family: String,
    pub font_size_pt: u32,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    /// Alpha applied to every watermark pass.
    pub opacity: u8,
    pub shadow_enabled: bool,
    pub outline_enabled: bool,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: "DejaVu Sans".to_string(),
            font_size_pt: 36,
            bold: false,
            italic: false,
            color: Color::white(),
            opacity: 180,
            shadow_enabled: false,
            outline_enabled: false,
        }
    }
}

impl WatermarkStyle {
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_font_family(&mut self, family: impl Into<String>) {
        self.font_family = family.into();
    }

    pub fn set_font_size(&mut self, size_pt: u32) {
        self.font_size_pt = size_pt.clamp(MIN_FONT_SIZE_PT, MAX_FONT_SIZE_PT);
    }

    /// Accepts any integer so slider/CLI values outside 0..=255 clamp instead of wrapping.
    pub fn set_opacity(&mut self, opacity: i32) {
        self.opacity = opacity.clamp(0, 255) as u8;
    }
}

/// The nine symbolic placement positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::CenterLeft,
        Anchor::Center,
        Anchor::CenterRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopCenter => "top-center",
            Anchor::TopRight => "top-right",
            Anchor::CenterLeft => "center-left",
            Anchor::Center => "center",
            Anchor::CenterRight => "center-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomCenter => "bottom-center",
            Anchor::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Anchor::ALL
            .into_iter()
            .find(|anchor| anchor.as_str() == normalized)
            .ok_or_else(|| format!("unknown anchor '{}'", s))
    }
}

/// Where the watermark sits: a symbolic anchor, or a point set by dragging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    Anchor(Anchor),
    Custom(Point),
}

impl Default for PlacementMode {
    fn default() -> Self {
        PlacementMode::Anchor(Anchor::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacementConfig {
    pub mode: PlacementMode,
    pub rotation_degrees: i32,
}

impl PlacementConfig {
    pub fn new(anchor: Anchor) -> Self {
        Self {
            mode: PlacementMode::Anchor(anchor),
            rotation_degrees: 0,
        }
    }

    /// Selecting a symbolic anchor always drops any dragged position.
    pub fn select_anchor(&mut self, anchor: Anchor) {
        self.mode = PlacementMode::Anchor(anchor);
    }

    pub fn set_rotation(&mut self, degrees: i32) {
        self.rotation_degrees = degrees.clamp(MIN_ROTATION_DEGREES, MAX_ROTATION_DEGREES);
    }

    pub fn anchor(&self) -> Option<Anchor> {
        match self.mode {
            PlacementMode::Anchor(anchor) => Some(anchor),
            PlacementMode::Custom(_) => None,
        }
    }

    pub fn custom_point(&self) -> Option<Point> {
        match self.mode {
            PlacementMode::Anchor(_) => None,
            PlacementMode::Custom(point) => Some(point),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.mode, PlacementMode::Custom(_))
    }
}

/// An image handed over by the import collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_rgba_round_trip() {
        let color = Color::new(0x12, 0xAB, 0xEF);
        assert_eq!(color.to_packed_rgba(), 0x12ABEFFF);
        assert_eq!(Color::from_packed_rgba(0x12ABEF00), color);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(Color::parse_hex("#FFF").unwrap(), Color::white());
        assert_eq!(
            Color::parse_hex("#ff8000").unwrap(),
            Color::new(255, 128, 0)
        );
        assert!(Color::parse_hex("FF8000").is_err());
        assert!(Color::parse_hex("#GG0000").is_err());
        assert!(Color::parse_hex("#12345").is_err());
        // Multi-byte characters with a 3 or 6 byte length must not be sliced.
        assert!(matches!(
            Color::parse_hex("#€"),
            Err(WatermarkError::Validation(_))
        ));
        assert!(matches!(
            Color::parse_hex("#ab€c"),
            Err(WatermarkError::Validation(_))
        ));
    }

    #[test]
    fn test_opacity_is_clamped() {
        let mut style = WatermarkStyle::default();
        style.set_opacity(400);
        assert_eq!(style.opacity, 255);
        style.set_opacity(-3);
        assert_eq!(style.opacity, 0);
        style.set_opacity(77);
        assert_eq!(style.opacity, 77);
    }

    #[test]
    fn test_font_size_is_clamped() {
        let mut style = WatermarkStyle::default();
        style.set_font_size(2);
        assert_eq!(style.font_size_pt, MIN_FONT_SIZE_PT);
        style.set_font_size(500);
        assert_eq!(style.font_size_pt, MAX_FONT_SIZE_PT);
    }

    #[test]
    fn test_select_anchor_clears_custom_point() {
        let mut placement = PlacementConfig {
            mode: PlacementMode::Custom(Point::new(40, 50)),
            rotation_degrees: 15,
        };
        placement.select_anchor(Anchor::TopCenter);
        assert_eq!(placement.anchor(), Some(Anchor::TopCenter));
        assert_eq!(placement.custom_point(), None);
        assert_eq!(placement.rotation_degrees, 15);
    }

    #[test]
    fn test_rotation_is_clamped() {
        let mut placement = PlacementConfig::default();
        placement.set_rotation(270);
        assert_eq!(placement.rotation_degrees, 180);
        placement.set_rotation(-999);
        assert_eq!(placement.rotation_degrees, -180);
    }

    #[test]
    fn test_anchor_parsing() {
        assert_eq!("top-left".parse::<Anchor>().unwrap(), Anchor::TopLeft);
        assert_eq!("Bottom_Center".parse::<Anchor>().unwrap(), Anchor::BottomCenter);
        assert!("middle".parse::<Anchor>().is_err());
        for anchor in Anchor::ALL {
            assert_eq!(anchor.to_string().parse::<Anchor>().unwrap(), anchor);
        }
    }

    #[test]
    fn test_point_parsing() {
        assert_eq!("12, -4".parse::<Point>().unwrap(), Point::new(12, -4));
        assert!("12".parse::<Point>().is_err());
        assert!("a,b".parse::<Point>().is_err());
    }
}
