mod editor;
mod error;
mod placement;
mod render;
mod text;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use editor::{EditCommand, WatermarkEditor};
pub use error::WatermarkError;
pub use placement::{DragSession, MARGIN, resolve_anchor};
pub use render::{SHADOW_OFFSET, SHADOW_OPACITY_FACTOR, blend_over, render, shadow_alpha};
pub use text::{FontLibrary, FontSpec, TextRasterizer, normalize_family};
pub use types::*;
