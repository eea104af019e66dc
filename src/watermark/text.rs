//! Text measurement and rasterization.
//!
//! The renderer only talks to the [`TextRasterizer`] trait. [`FontLibrary`] is the
//! production implementation backed by TrueType/OpenType files loaded with
//! `ab_glyph`; faces missing from a family are synthesized (double strike for
//! bold, shear for italic).

use ab_glyph::{Font, FontVec, GlyphId, PxScale, PxScaleFont, ScaleFont, point};
use image::{Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::WatermarkError;
use super::render::blend_over;
use super::types::WatermarkStyle;

/// Horizontal offset per pixel of height used for synthesized italics.
const ITALIC_SHEAR: f32 = 0.2;

/// Screen resolution used to turn point sizes into pixels.
const DPI: f32 = 96.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSpec {
    pub family: String,
    pub size_pt: u32,
    pub bold: bool,
    pub italic: bool,
}

impl FontSpec {
    pub fn from_style(style: &WatermarkStyle) -> Self {
        Self {
            family: style.font_family.clone(),
            size_pt: style.font_size_pt,
            bold: style.bold,
            italic: style.italic,
        }
    }

    pub fn pixel_size(&self) -> f32 {
        self.size_pt as f32 * DPI / 72.0
    }
}

/// Measures and draws a single line of text.
pub trait TextRasterizer {
    /// Bounding box `(width, height)` of `text` in pixels.
    fn measure(&self, text: &str, font: &FontSpec) -> Result<(u32, u32), WatermarkError>;

    /// Draw `text` with its baseline starting at `(x, y)`. `color`'s alpha channel is
    /// the alpha of fully covered pixels; the result is blended over `canvas`.
    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        x: i32,
        y: i32,
        text: &str,
        font: &FontSpec,
        color: Rgba<u8>,
    ) -> Result<(), WatermarkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaceKind {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FaceKind {
    fn is_bold(self) -> bool {
        matches!(self, FaceKind::Bold | FaceKind::BoldItalic)
    }

    fn is_italic(self) -> bool {
        matches!(self, FaceKind::Italic | FaceKind::BoldItalic)
    }
}

#[derive(Default)]
struct FontFamily {
    faces: Vec<(FaceKind, Arc<FontVec>)>,
}

struct Face<'a> {
    font: &'a FontVec,
    synthetic_bold: bool,
    synthetic_italic: bool,
}

/// Font faces grouped by family name.
pub struct FontLibrary {
    families: BTreeMap<String, FontFamily>,
    default_family: String,
}

impl FontLibrary {
    pub fn new(default_family: &str) -> Self {
        Self {
            families: BTreeMap::new(),
            default_family: normalize_family(default_family),
        }
    }

    /// Load every `.ttf`/`.otf` file directly inside `directory`.
    /// Files that fail to parse are skipped with a warning.
    pub fn load_directory(directory: &Path, default_family: &str) -> Result<Self, WatermarkError> {
        let mut library = Self::new(default_family);

        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            let is_font = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
                .unwrap_or(false);
            if !is_font || !path.is_file() {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let data = std::fs::read(&path)?;
            match library.add_font(stem, data) {
                Ok(()) => debug!("Loaded font face {:?}", path),
                Err(e) => warn!("Skipping font {:?}: {}", path, e),
            }
        }

        info!(
            "Loaded {} font families from {:?}",
            library.families.len(),
            directory
        );
        Ok(library)
    }

    /// Register a face. `face_name` follows the `Family-Style` file naming
    /// convention, e.g. `DejaVuSans-BoldOblique`.
    pub fn add_font(&mut self, face_name: &str, data: Vec<u8>) -> Result<(), WatermarkError> {
        let font = FontVec::try_from_vec(data)
            .map_err(|_| WatermarkError::Font(format!("failed to parse font '{}'", face_name)))?;
        let (family, kind) = split_face_name(face_name);

        let entry = self.families.entry(normalize_family(family)).or_default();
        entry.faces.retain(|(existing, _)| *existing != kind);
        entry.faces.push((kind, Arc::new(font)));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn family_names(&self) -> Vec<&str> {
        self.families.keys().map(String::as_str).collect()
    }

    fn face(&self, spec: &FontSpec) -> Result<Face<'_>, WatermarkError> {
        let family = self
            .families
            .get(&normalize_family(&spec.family))
            .or_else(|| self.families.get(&self.default_family))
            .or_else(|| self.families.values().next())
            .ok_or_else(|| WatermarkError::Font("no fonts available".to_string()))?;

        let best = family
            .faces
            .iter()
            .filter(|(kind, _)| (!kind.is_bold() || spec.bold) && (!kind.is_italic() || spec.italic))
            .max_by_key(|(kind, _)| kind.is_bold() as u8 + kind.is_italic() as u8)
            .or_else(|| family.faces.first())
            .ok_or_else(|| WatermarkError::Font(format!("family '{}' has no faces", spec.family)))?;

        let (kind, font) = best;
        Ok(Face {
            font: &**font,
            synthetic_bold: spec.bold && !kind.is_bold(),
            synthetic_italic: spec.italic && !kind.is_italic(),
        })
    }
}

impl TextRasterizer for FontLibrary {
    fn measure(&self, text: &str, font: &FontSpec) -> Result<(u32, u32), WatermarkError> {
        let face = self.face(font)?;
        let scaled = face.font.as_scaled(PxScale::from(font.pixel_size()));

        let mut width = advance_width(&scaled, text);
        if face.synthetic_bold {
            width += 1.0;
        }
        if face.synthetic_italic {
            width += scaled.ascent() * ITALIC_SHEAR;
        }

        let height = scaled.ascent() - scaled.descent();
        Ok((width.ceil() as u32, height.ceil() as u32))
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        x: i32,
        y: i32,
        text: &str,
        font: &FontSpec,
        color: Rgba<u8>,
    ) -> Result<(), WatermarkError> {
        if color[3] == 0 || text.is_empty() {
            return Ok(());
        }

        let face = self.face(font)?;
        let scale = PxScale::from(font.pixel_size());
        let scaled = face.font.as_scaled(scale);

        // Coverage is accumulated with max() so overlapping strokes never
        // exceed the requested alpha.
        let pad = (font.pixel_size() / 2.0).ceil() as i32 + 2;
        let mut mask = CoverageMask::new(
            x - pad,
            y - scaled.ascent().ceil() as i32 - pad,
            (advance_width(&scaled, text) + scaled.ascent() * ITALIC_SHEAR).ceil() as i32
                + 2 * pad
                + 1,
            (scaled.ascent() - scaled.descent()).ceil() as i32 + 2 * pad,
        );

        let strikes = if face.synthetic_bold { 2 } else { 1 };
        for strike in 0..strikes {
            let mut cursor_x = x as f32 + strike as f32;
            let mut previous: Option<GlyphId> = None;

            for c in text.chars() {
                let glyph_id = scaled.glyph_id(c);
                if let Some(prev) = previous {
                    cursor_x += scaled.kern(prev, glyph_id);
                }

                let glyph = glyph_id.with_scale_and_position(scale, point(cursor_x, y as f32));
                if let Some(outlined) = face.font.outline_glyph(glyph) {
                    let bounds = outlined.px_bounds();
                    outlined.draw(|gx, gy, coverage| {
                        let py = bounds.min.y as i32 + gy as i32;
                        let mut px = bounds.min.x as i32 + gx as i32;
                        if face.synthetic_italic {
                            px += ((y - py) as f32 * ITALIC_SHEAR).round() as i32;
                        }
                        mask.add(px, py, coverage);
                    });
                }

                cursor_x += scaled.h_advance(glyph_id);
                previous = Some(glyph_id);
            }
        }

        mask.paint(canvas, color);
        Ok(())
    }
}

fn advance_width(scaled: &PxScaleFont<&FontVec>, text: &str) -> f32 {
    let mut width = 0.0f32;
    let mut previous: Option<GlyphId> = None;

    for c in text.chars() {
        let glyph_id = scaled.glyph_id(c);
        if let Some(prev) = previous {
            width += scaled.kern(prev, glyph_id);
        }
        width += scaled.h_advance(glyph_id);
        previous = Some(glyph_id);
    }

    width
}

/// Per-pixel glyph coverage over a rectangle of the canvas.
struct CoverageMask {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
    coverage: Vec<f32>,
}

impl CoverageMask {
    fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            left,
            top,
            width,
            height,
            coverage: vec![0.0; (width * height) as usize],
        }
    }

    fn add(&mut self, x: i32, y: i32, coverage: f32) {
        let (mx, my) = (x - self.left, y - self.top);
        if mx < 0 || my < 0 || mx >= self.width || my >= self.height {
            return;
        }
        let cell = &mut self.coverage[(my * self.width + mx) as usize];
        *cell = cell.max(coverage.clamp(0.0, 1.0));
    }

    fn paint(&self, canvas: &mut RgbaImage, color: Rgba<u8>) {
        let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);

        for my in 0..self.height {
            for mx in 0..self.width {
                let coverage = self.coverage[(my * self.width + mx) as usize];
                let alpha = (coverage * color[3] as f32).round() as u8;
                if alpha == 0 {
                    continue;
                }

                let (x, y) = (self.left + mx, self.top + my);
                if x < 0 || y < 0 || x >= cw || y >= ch {
                    continue;
                }

                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                *pixel = blend_over(*pixel, Rgba([color[0], color[1], color[2], alpha]));
            }
        }
    }
}

/// "DejaVu Sans", "dejavu-sans" and "DejaVuSans" all name the same family.
pub fn normalize_family(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn split_face_name(name: &str) -> (&str, FaceKind) {
    const SUFFIXES: [(&str, FaceKind); 6] = [
        ("-bolditalic", FaceKind::BoldItalic),
        ("-boldoblique", FaceKind::BoldItalic),
        ("-bold", FaceKind::Bold),
        ("-italic", FaceKind::Italic),
        ("-oblique", FaceKind::Italic),
        ("-regular", FaceKind::Regular),
    ];

    for (suffix, kind) in SUFFIXES {
        if let Some(split) = name.len().checked_sub(suffix.len())
            && let Some(tail) = name.get(split..)
            && tail.eq_ignore_ascii_case(suffix)
        {
            return (&name[..split], kind);
        }
    }
    (name, FaceKind::Regular)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FONT_PATH: &str = "static/fonts/DejaVuSans.ttf";

    fn load_test_font() -> Option<FontLibrary> {
        let data = std::fs::read(FONT_PATH).ok()?;
        let mut library = FontLibrary::new("DejaVu Sans");
        library.add_font("DejaVuSans", data).ok()?;
        Some(library)
    }

    #[test]
    fn test_split_face_name() {
        assert_eq!(
            split_face_name("DejaVuSans-BoldOblique"),
            ("DejaVuSans", FaceKind::BoldItalic)
        );
        assert_eq!(split_face_name("Arial-Bold"), ("Arial", FaceKind::Bold));
        assert_eq!(split_face_name("Arial-Italic"), ("Arial", FaceKind::Italic));
        assert_eq!(split_face_name("Arial"), ("Arial", FaceKind::Regular));
        assert_eq!(split_face_name("Noto-Regular"), ("Noto", FaceKind::Regular));
    }

    #[test]
    fn test_normalize_family() {
        assert_eq!(normalize_family("DejaVu Sans"), "dejavusans");
        assert_eq!(normalize_family("dejavu-sans"), "dejavusans");
        assert_eq!(normalize_family("DejaVuSans"), "dejavusans");
    }

    #[test]
    fn test_empty_library_reports_font_error() {
        let library = FontLibrary::new("DejaVu Sans");
        let spec = FontSpec {
            family: "DejaVu Sans".to_string(),
            size_pt: 24,
            bold: false,
            italic: false,
        };
        assert!(matches!(
            library.measure("hello", &spec),
            Err(WatermarkError::Font(_))
        ));
    }

    #[test]
    fn test_invalid_font_data_is_rejected() {
        let mut library = FontLibrary::new("Broken");
        assert!(library.add_font("Broken", vec![0, 1, 2, 3]).is_err());
        assert!(library.is_empty());
    }

    #[test]
    fn test_point_size_to_pixels() {
        let spec = FontSpec {
            family: String::new(),
            size_pt: 36,
            bold: false,
            italic: false,
        };
        assert_eq!(spec.pixel_size(), 48.0);
    }

    #[test]
    fn test_measure_and_draw_with_real_font() {
        // Skip test if font file doesn't exist
        let Some(library) = load_test_font() else {
            return;
        };

        let regular = FontSpec {
            family: "Unknown Family".to_string(),
            size_pt: 24,
            bold: false,
            italic: false,
        };
        let bold = FontSpec {
            bold: true,
            ..regular.clone()
        };

        let (w, h) = library.measure("Watermark", &regular).unwrap();
        assert!(w > 0 && h > 0);
        let (bold_w, _) = library.measure("Watermark", &bold).unwrap();
        assert!(bold_w > w);

        let mut canvas = RgbaImage::new(400, 100);
        library
            .draw_text(&mut canvas, 10, 60, "Watermark", &regular, Rgba([255, 0, 0, 255]))
            .unwrap();
        assert!(canvas.pixels().any(|p| p[3] == 255 && p[0] == 255));
        assert!(canvas.pixels().all(|p| p[1] == 0 && p[2] == 0));
    }
}
