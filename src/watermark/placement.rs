//! Turns a placement configuration into a text draw origin, and tracks the
//! pointer gesture that repositions the watermark.
//!
//! The origin's `y` is the text baseline, so anchors on the top row push the
//! baseline down by the text height.

use super::types::{Anchor, PlacementConfig, PlacementMode, Point};

/// Distance kept between the text box and the image edge for symbolic anchors.
pub const MARGIN: i32 = 30;

/// Resolve the draw origin `(x, y_baseline)` for text of the given size.
///
/// All halving truncates toward zero. Results may be negative when the text is
/// larger than the image.
pub fn resolve_anchor(
    image_width: u32,
    image_height: u32,
    text_width: u32,
    text_height: u32,
    placement: &PlacementConfig,
) -> (i32, i32) {
    let w = image_width as i32;
    let h = image_height as i32;
    let tw = text_width as i32;
    let th = text_height as i32;

    let left = MARGIN;
    let center_x = w / 2 - tw / 2;
    let right = w - tw - MARGIN;

    let top = MARGIN + th;
    let center_y = h / 2 + th / 2;
    let bottom = h - MARGIN;

    match placement.mode {
        PlacementMode::Custom(point) => (point.x - tw / 2, point.y + th / 2),
        PlacementMode::Anchor(anchor) => match anchor {
            Anchor::TopLeft => (left, top),
            Anchor::TopCenter => (center_x, top),
            Anchor::TopRight => (right, top),
            Anchor::CenterLeft => (left, center_y),
            Anchor::Center => (center_x, center_y),
            Anchor::CenterRight => (right, center_y),
            Anchor::BottomLeft => (left, bottom),
            Anchor::BottomCenter => (center_x, bottom),
            Anchor::BottomRight => (right, bottom),
        },
    }
}

/// State of an in-progress pointer drag. Exists only between pointer-down and
/// pointer-up and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    pub last_pointer_pos: Point,
    point: Point,
}

impl DragSession {
    /// Pointer-down. Continues from the current custom point when there is one,
    /// otherwise the clicked position becomes the seed.
    pub fn begin(placement: &PlacementConfig, pointer: Point) -> Self {
        Self {
            last_pointer_pos: pointer,
            point: placement.custom_point().unwrap_or(pointer),
        }
    }

    /// Pointer-move. Shifts the custom point by the pointer delta and forces the
    /// placement into custom mode.
    pub fn drag_to(&mut self, placement: &mut PlacementConfig, pointer: Point) {
        let dx = pointer.x - self.last_pointer_pos.x;
        let dy = pointer.y - self.last_pointer_pos.y;
        self.point = Point::new(self.point.x + dx, self.point.y + dy);
        self.last_pointer_pos = pointer;
        placement.mode = PlacementMode::Custom(self.point);
    }

    pub fn point(&self) -> Point {
        self.point
    }
}
