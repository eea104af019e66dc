use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
