use image::{Rgba, RgbaImage};

use super::WatermarkError;
use super::render::blend_over;
use super::text::{FontSpec, TextRasterizer};

pub const CELL_W: u32 = 8;
pub const CELL_H: u32 = 10;

/// Paints every character as a solid `CELL_W x CELL_H` cell above the baseline,
/// so pixel assertions do not depend on a font file.
pub struct BlockRasterizer;

impl TextRasterizer for BlockRasterizer {
    fn measure(&self, text: &str, _font: &FontSpec) -> Result<(u32, u32), WatermarkError> {
        Ok((text.chars().count() as u32 * CELL_W, CELL_H))
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
        let (w, h) = self.measure(text, font)?;
        for py in (y - h as i32)..y {
            for px in x..(x + w as i32) {
                if px >= 0 && py >= 0 && px < canvas.width() as i32 && py < canvas.height() as i32 {
                    let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                    *pixel = blend_over(*pixel, color);
                }
            }
        }
        Ok(())
    }
}
