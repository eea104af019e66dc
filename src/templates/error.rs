use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Invalid template name: {0}")]
    Validation(String),

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml_edit::ser::Error),

    #[error("TOML parsing error: {0}")]
    Deserialize(#[from] toml_edit::de::Error),

    #[error("Invalid template record: {0}")]
    InvalidRecord(String),
}
