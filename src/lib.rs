use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod export;
pub mod import;
pub mod startup_checks;
pub mod templates;
pub mod watermark;

use export::{ExportRule, NamingMode, OutputFormat};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub fonts: FontConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FontConfig {
    pub directory: PathBuf,
    /// Family used when a style names a family that is not installed.
    pub default_family: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub naming_mode: NamingMode,
    #[serde(default)]
    pub affix_text: String,
    #[serde(default)]
    pub format: OutputFormat,
    pub jpeg_quality: Option<u8>,
    pub workers: Option<usize>,
    #[serde(default = "default_true")]
    pub preserve_icc_profile: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Watermark Studio".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("static/fonts"),
            default_family: "DejaVuSans".to_string(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            naming_mode: NamingMode::default(),
            affix_text: String::new(),
            format: OutputFormat::default(),
            jpeg_quality: Some(90),
            workers: Some(4),
            preserve_icc_profile: true,
        }
    }
}

impl ExportConfig {
    /// Export rule built from the configured defaults and a destination.
    pub fn rule(&self, output_dir: Option<PathBuf>) -> ExportRule {
        ExportRule {
            naming_mode: self.naming_mode,
            affix_text: self.affix_text.clone(),
            output_format: self.format,
            output_dir,
        }
    }
}
