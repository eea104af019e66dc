use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate};
use tracing::debug;

use super::WatermarkError;
use super::placement::resolve_anchor;
use super::text::{FontSpec, TextRasterizer};
use super::types::{PlacementConfig, WatermarkStyle};

/// Offset of the drop shadow from the main text.
pub const SHADOW_OFFSET: (i32, i32) = (2, 2);

/// Shadow alpha relative to the style opacity.
pub const SHADOW_OPACITY_FACTOR: f32 = 0.6;

const OUTLINE_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Composite the watermark described by `style` and `placement` onto a copy of
/// `source`. The source is never modified, so repeated calls with different
/// styles do not accumulate.
pub fn render(
    source: &DynamicImage,
    style: &WatermarkStyle,
    placement: &PlacementConfig,
    rasterizer: &dyn TextRasterizer,
) -> Result<DynamicImage, WatermarkError> {
    if style.text.trim().is_empty() {
        return Err(WatermarkError::Validation(
            "watermark text is empty".to_string(),
        ));
    }

    let font = FontSpec::from_style(style);
    let (text_width, text_height) = rasterizer.measure(&style.text, &font)?;

    let mut composite = source.to_rgba8();
    let (width, height) = composite.dimensions();
    let (x, y) = resolve_anchor(width, height, text_width, text_height, placement);

    debug!(
        "Rendering watermark {:?} at ({}, {}) size {}x{} rotation {}",
        style.text, x, y, text_width, text_height, placement.rotation_degrees
    );

    let mut layer = RgbaImage::new(width, height);
    let color = style.color;

    if style.shadow_enabled {
        let shadow_alpha = shadow_alpha(style.opacity);
        rasterizer.draw_text(
            &mut layer,
            x + SHADOW_OFFSET.0,
            y + SHADOW_OFFSET.1,
            &style.text,
            &font,
            Rgba([color.r, color.g, color.b, shadow_alpha]),
        )?;
    }

    if style.outline_enabled {
        for (dx, dy) in OUTLINE_OFFSETS {
            rasterizer.draw_text(
                &mut layer,
                x + dx,
                y + dy,
                &style.text,
                &font,
                Rgba([0, 0, 0, style.opacity]),
            )?;
        }
    }

    rasterizer.draw_text(
        &mut layer,
        x,
        y,
        &style.text,
        &font,
        Rgba([color.r, color.g, color.b, style.opacity]),
    )?;

    if placement.rotation_degrees != 0 {
        let pivot = (
            x as f32 + text_width as f32 / 2.0,
            y as f32 - text_height as f32 / 2.0,
        );
        layer = rotate(
            &layer,
            pivot,
            (placement.rotation_degrees as f32).to_radians(),
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
        );
    }

    composite_over(&mut composite, &layer);
    Ok(DynamicImage::ImageRgba8(composite))
}

pub fn shadow_alpha(opacity: u8) -> u8 {
    (opacity as f32 * SHADOW_OPACITY_FACTOR).round() as u8
}

/// Blend `layer` over `base`. Both images must have the same dimensions.
fn composite_over(base: &mut RgbaImage, layer: &RgbaImage) {
    for (bottom, top) in base.pixels_mut().zip(layer.pixels()) {
        *bottom = blend_over(*bottom, *top);
    }
}

/// Straight-alpha "over" operator. A fully transparent `top` leaves `bottom`
/// untouched and a fully opaque one replaces it.
pub fn blend_over(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    match top[3] {
        0 => return bottom,
        255 => return top,
        _ => {}
    }

    let top_alpha = top[3] as f32 / 255.0;
    let bottom_alpha = bottom[3] as f32 / 255.0;
    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    let blend = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}
