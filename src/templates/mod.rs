// Template module - named style/placement records on disk
mod error;
mod store;
mod types;

pub use error::TemplateError;
pub use store::TemplateStore;
pub use types::{RECORD_VERSION, Template};
