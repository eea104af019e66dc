use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::ExportError;

pub const DEFAULT_PREFIX: &str = "wm_";
pub const DEFAULT_SUFFIX: &str = "_watermarked";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingMode {
    KeepOriginal,
    Prefix,
    #[default]
    Suffix,
}

impl FromStr for NamingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "keep-original" | "keep" | "original" => Ok(NamingMode::KeepOriginal),
            "prefix" => Ok(NamingMode::Prefix),
            "suffix" => Ok(NamingMode::Suffix),
            _ => Err(format!(
                "unknown naming mode '{}' (expected keep-original, prefix or suffix)",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    #[default]
    Png,
}

impl OutputFormat {
    /// Lowercased format name, used as the output file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            _ => Err(format!("unsupported output format '{}'", s)),
        }
    }
}

/// How exported files are named, encoded and where they go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportRule {
    pub naming_mode: NamingMode,
    /// Empty means the mode's default affix.
    pub affix_text: String,
    pub output_format: OutputFormat,
    /// `None` until the user has picked a destination.
    pub output_dir: Option<PathBuf>,
}

impl ExportRule {
    /// The `(prefix, suffix)` pair actually inserted around each base name.
    pub fn effective_affixes(&self) -> (&str, &str) {
        let custom = self.affix_text.as_str();
        match self.naming_mode {
            NamingMode::KeepOriginal => ("", ""),
            NamingMode::Prefix if custom.is_empty() => (DEFAULT_PREFIX, ""),
            NamingMode::Prefix => (custom, ""),
            NamingMode::Suffix if custom.is_empty() => ("", DEFAULT_SUFFIX),
            NamingMode::Suffix => ("", custom),
        }
    }

    /// `prefix + stem + suffix + "." + extension` for one source path.
    pub fn output_name(&self, source: &std::path::Path) -> Result<String, ExportError> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ExportError::Validation(format!("source path has no file name: {:?}", source))
            })?;
        let (prefix, suffix) = self.effective_affixes();
        Ok(format!(
            "{}{}{}.{}",
            prefix,
            stem,
            suffix,
            self.output_format.extension()
        ))
    }
}

/// A source that could not be exported.
#[derive(Debug)]
pub struct ExportFailure {
    pub source: PathBuf,
    pub target: Option<PathBuf>,
    pub error: ExportError,
}

/// Outcome of a batch export. Lists keep the order of the source paths.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<ExportFailure>,
    /// Sources never attempted because the export was cancelled.
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && !self.cancelled
    }

    pub fn summary(&self) -> String {
        let mut summary = format!("{} written", self.written.len());
        if !self.failed.is_empty() {
            summary.push_str(&format!(", {} failed", self.failed.len()));
        }
        if self.cancelled {
            summary.push_str(&format!(", cancelled ({} skipped)", self.skipped.len()));
        }
        summary
    }
}
