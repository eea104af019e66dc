use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::TemplateError;
use super::types::{LastUsedRecord, RECORD_VERSION, Template, TemplateRecord};
use crate::watermark::{PlacementConfig, WatermarkStyle};

const TEMPLATE_EXTENSION: &str = "toml";

/// Holds the name of the most recently saved template. The leading dot and the
/// missing `.toml` extension keep it out of `list()`.
const LAST_USED_FILE: &str = ".last_used";

const FORBIDDEN_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// One TOML file per template inside a single directory, plus a last-used pointer.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    directory: PathBuf,
}

impl TemplateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Write (or overwrite) the template `name` and mark it as last used.
    ///
    /// The template record is fully in place before the pointer is touched, so an
    /// interruption can at worst leave the pointer at the previous template.
    pub fn save(
        &self,
        name: &str,
        style: &WatermarkStyle,
        placement: &PlacementConfig,
    ) -> Result<(), TemplateError> {
        let path = self.template_path(name)?;
        std::fs::create_dir_all(&self.directory)?;

        let record = TemplateRecord::new(name, style, placement);
        let document = toml_edit::ser::to_document(&record)?;
        write_atomic(&path, document.to_string().as_bytes())?;
        debug!("Wrote template record {:?}", path);

        let pointer = LastUsedRecord {
            version: RECORD_VERSION,
            name: name.to_string(),
        };
        let document = toml_edit::ser::to_document(&pointer)?;
        write_atomic(
            &self.directory.join(LAST_USED_FILE),
            document.to_string().as_bytes(),
        )?;

        info!("Saved template '{}'", name);
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Template, TemplateError> {
        let path = self.template_path(name)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TemplateError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let record: TemplateRecord = toml_edit::de::from_str(&contents)?;
        let template = record.into_template(name)?;
        debug!("Loaded template '{}'", name);
        Ok(template)
    }

    /// Names of all stored templates. A missing directory means no templates.
    pub fn list(&self) -> Result<BTreeSet<String>, TemplateError> {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let path = entry?.path();
            let is_template = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == TEMPLATE_EXTENSION)
                .unwrap_or(false);
            if !is_template || !path.is_file() {
                continue;
            }

            if let Some(name) = path.file_stem().and_then(|s| s.to_str())
                && validate_name(name).is_ok()
            {
                names.insert(name.to_string());
            }
        }

        Ok(names)
    }

    /// Remove the template `name`. The last-used pointer is left as is, even
    /// when it names the deleted template; `load_last` tolerates that.
    pub fn delete(&self, name: &str) -> Result<(), TemplateError> {
        let path = self.template_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted template '{}'", name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TemplateError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Name stored in the last-used pointer, whether or not that template still exists.
    pub fn last_used(&self) -> Result<Option<String>, TemplateError> {
        let contents = match std::fs::read_to_string(self.directory.join(LAST_USED_FILE)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match toml_edit::de::from_str::<LastUsedRecord>(&contents) {
            Ok(record) if !record.name.is_empty() => Ok(Some(record.name)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Ignoring unreadable last-used pointer: {}", e);
                Ok(None)
            }
        }
    }

    /// The most recently saved template, or `None` when nothing was saved yet or
    /// the pointer refers to a template that has since been deleted.
    pub fn load_last(&self) -> Result<Option<Template>, TemplateError> {
        let Some(name) = self.last_used()? else {
            return Ok(None);
        };

        match self.load(&name) {
            Ok(template) => Ok(Some(template)),
            Err(TemplateError::NotFound(_)) | Err(TemplateError::Validation(_)) => {
                warn!("Last used template '{}' no longer exists", name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn template_path(&self, name: &str) -> Result<PathBuf, TemplateError> {
        validate_name(name)?;
        Ok(self
            .directory
            .join(format!("{}.{}", name, TEMPLATE_EXTENSION)))
    }
}

/// Template names double as file names.
fn validate_name(name: &str) -> Result<(), TemplateError> {
    if name.trim().is_empty() {
        return Err(TemplateError::Validation("name is empty".to_string()));
    }
    if name.starts_with('.') {
        return Err(TemplateError::Validation(format!(
            "'{}' must not start with '.'",
            name
        )));
    }
    if name
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_NAME_CHARS.contains(&c))
    {
        return Err(TemplateError::Validation(format!(
            "'{}' contains a character that is not allowed in file names",
            name
        )));
    }
    Ok(())
}

/// Write to a hidden sibling first, then rename over the destination.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), std::io::Error> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name.trim_start_matches('.')));

    std::fs::write(&temp_path, contents)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}
