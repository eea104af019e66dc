use image::{DynamicImage, codecs::png::PngEncoder};
use std::io::BufWriter;
use std::path::Path;

use crate::export::ExportError;

/// Save image as PNG, keeping the alpha channel
pub fn save(image: &DynamicImage, path: &Path) -> Result<(), ExportError> {
    let output = BufWriter::new(std::fs::File::create(path)?);
    let encoder = PngEncoder::new(output);
    image.write_with_encoder(encoder)?;
    Ok(())
}
