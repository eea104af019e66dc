pub mod jpeg;
pub mod png;

use image::DynamicImage;
use std::path::Path;

use super::{ExportError, OutputFormat};

/// Encode `image` as `format` and write it to `path`.
pub fn save(
    image: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    jpeg_quality: u8,
    icc_profile: Option<&[u8]>,
) -> Result<(), ExportError> {
    match format {
        OutputFormat::Jpeg => jpeg::save_with_profile(image, path, jpeg_quality, icc_profile),
        OutputFormat::Png => png::save(image, path),
    }
}
