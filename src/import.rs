//! Expands command line inputs into the list of images an editing session works on.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::watermark::{SourceImage, WatermarkError};

pub fn is_image(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".jpg")
        || lower.ends_with(".jpeg")
        || lower.ends_with(".png")
        || lower.ends_with(".bmp")
        || lower.ends_with(".tiff")
        || lower.ends_with(".tif")
}

/// Files are taken as given; folders contribute the images directly inside them,
/// sorted by name. Order of `inputs` is kept and repeated paths are dropped.
pub fn collect_image_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, WatermarkError> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    let mut push = |path: PathBuf| {
        let key = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if seen.insert(key) {
            paths.push(path);
        } else {
            debug!("Skipping duplicate input {:?}", path);
        }
    };

    for input in inputs {
        if input.is_dir() {
            let walker = WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();
            for entry in walker.into_iter().flatten() {
                if entry.file_type().is_file()
                    && let Some(name) = entry.file_name().to_str()
                    && is_image(name)
                {
                    push(entry.into_path());
                }
            }
        } else if input.is_file() {
            let name = input
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if is_image(name) {
                push(input.clone());
            } else {
                warn!("Ignoring {:?}: not a supported image type", input);
            }
        } else {
            return Err(WatermarkError::Validation(format!(
                "input does not exist: {:?}",
                input
            )));
        }
    }

    Ok(paths)
}

/// Read the pixel dimensions from the file header without decoding the image.
pub fn probe(path: &Path) -> Result<SourceImage, WatermarkError> {
    let (width, height) = image::image_dimensions(path)?;
    Ok(SourceImage {
        path: path.to_path_buf(),
        width,
        height,
    })
}
