// Export module - writes the committed composite under per-source file names
mod core;
mod error;
pub mod formats;
mod types;

pub use self::core::BatchExporter;
pub use error::ExportError;
pub use types::*;
