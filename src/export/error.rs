use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Export worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
