use crate::Config;
use crate::watermark::normalize_family;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create templates directory: {0}")]
    TemplateDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Font directory does not exist: {0}")]
    FontDirectoryMissing(String),

    #[error("Font directory contains no .ttf or .otf files: {0}")]
    NoFontsFound(String),

    #[error("Default font family not found: {0}")]
    DefaultFontMissing(String),
}

impl StartupCheckError {
    /// Without any font nothing can be rendered.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::FontDirectoryMissing(_) | StartupCheckError::NoFontsFound(_)
        )
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let templates_dir = Path::new(&config.templates.directory);
    if !templates_dir.exists() {
        info!(
            "Templates directory does not exist, creating: {:?}",
            templates_dir
        );
        if let Err(e) = tokio::fs::create_dir_all(templates_dir).await {
            error!("Failed to create templates directory: {}", e);
            errors.push(StartupCheckError::TemplateDirectoryCreationFailed(e));
        }
    } else {
        info!("Templates directory exists: {:?}", templates_dir);
    }

    let font_dir = Path::new(&config.fonts.directory);
    let directory = font_dir.display().to_string();
    match tokio::fs::read_dir(font_dir).await {
        Err(e) => {
            error!("Font directory {:?} is not accessible: {}", font_dir, e);
            errors.push(StartupCheckError::FontDirectoryMissing(directory));
        }
        Ok(mut entries) => {
            let mut font_files = Vec::new();
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                let is_font = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| matches!(ext.to_lowercase().as_str(), "ttf" | "otf"))
                    .unwrap_or(false);
                if is_font && let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    font_files.push(stem.to_string());
                }
            }

            if font_files.is_empty() {
                error!("No font files found in {:?}", font_dir);
                errors.push(StartupCheckError::NoFontsFound(directory));
            } else {
                info!("Found {} font files in {:?}", font_files.len(), font_dir);
                let wanted = normalize_family(&config.fonts.default_family);
                if !font_files.iter().any(|stem| normalize_family(stem) == wanted) {
                    warn!(
                        "Default font family '{}' not found in {:?}",
                        config.fonts.default_family, font_dir
                    );
                    errors.push(StartupCheckError::DefaultFontMissing(
                        config.fonts.default_family.clone(),
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.fonts.directory = dir.path().join("fonts");
        config.templates.directory = dir.path().join("templates");
        config
    }

    #[tokio::test]
    async fn test_missing_font_directory_is_critical() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert!(errors.iter().any(StartupCheckError::is_critical));
        assert!(config.templates.directory.is_dir());
    }

    #[tokio::test]
    async fn test_default_family_missing_is_not_critical() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::create_dir_all(&config.fonts.directory).unwrap();
        std::fs::write(config.fonts.directory.join("Other.ttf"), b"not parsed here").unwrap();

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], StartupCheckError::DefaultFontMissing(_)));
        assert!(!errors[0].is_critical());
    }

    #[tokio::test]
    async fn test_checks_pass_with_default_font() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::create_dir_all(&config.fonts.directory).unwrap();
        std::fs::write(config.fonts.directory.join("DejaVuSans.ttf"), b"").unwrap();

        assert!(perform_startup_checks(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_default_family_matches_like_font_lookup() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.fonts.default_family = "DejaVu Sans".to_string();
        std::fs::create_dir_all(&config.fonts.directory).unwrap();
        std::fs::write(config.fonts.directory.join("dejavu-sans.ttf"), b"").unwrap();

        assert!(perform_startup_checks(&config).await.is_ok());
        assert_eq!(
            normalize_family(&config.fonts.default_family),
            normalize_family("dejavu-sans")
        );
    }
}
