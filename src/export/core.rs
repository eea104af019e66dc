use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::formats;
use super::types::{ExportFailure, ExportReport, ExportRule, OutputFormat};
use super::ExportError;

/// Writes one composited image under a derived name for every source path.
#[derive(Debug, Clone)]
pub struct BatchExporter {
    pub jpeg_quality: u8,
    /// Maximum number of files encoded at the same time.
    pub workers: usize,
    /// Embed the active source's ICC profile into JPEG output.
    pub preserve_icc_profile: bool,
}

impl Default for BatchExporter {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            workers: 4,
            preserve_icc_profile: true,
        }
    }
}

enum Outcome {
    Written(PathBuf),
    Failed(ExportFailure),
    Skipped(PathBuf),
}

impl BatchExporter {
    pub fn from_config(config: &crate::ExportConfig) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality.unwrap_or(90).clamp(1, 100),
            workers: config.workers.unwrap_or(4).max(1),
            preserve_icc_profile: config.preserve_icc_profile,
        }
    }

    /// Export `rendered` once per entry of `source_paths`.
    ///
    /// Every source receives the same composite (the one rendered for
    /// `active_source`). Validation failures abort before anything is written;
    /// failures on individual files are collected in the report and do not stop
    /// the remaining files. Cancellation is honored between files.
    pub async fn export(
        &self,
        rendered: Option<Arc<DynamicImage>>,
        active_source: &Path,
        source_paths: &[PathBuf],
        rule: &ExportRule,
        cancel: &CancellationToken,
    ) -> Result<ExportReport, ExportError> {
        let rendered = rendered.ok_or_else(|| {
            ExportError::Validation("apply watermark first: nothing has been rendered".to_string())
        })?;
        let output_dir = validate_output_dir(rule, active_source, source_paths)?;

        let (prefix, suffix) = rule.effective_affixes();
        if contains_separator(prefix) || contains_separator(suffix) {
            return Err(ExportError::Validation(format!(
                "affix must not contain a path separator: {:?}",
                rule.affix_text
            )));
        }

        let icc_profile = match rule.output_format {
            OutputFormat::Jpeg if self.preserve_icc_profile => {
                formats::jpeg::extract_icc_profile(active_source).map(Arc::new)
            }
            _ => None,
        };

        info!(
            "Exporting {} images to {:?} as {}",
            source_paths.len(),
            output_dir,
            rule.output_format
        );

        let semaphore = Arc::new(Semaphore::new(self.workers.max(1)));
        let mut tasks = JoinSet::new();
        let mut outcomes: Vec<(usize, Outcome)> = Vec::with_capacity(source_paths.len());

        for (index, source) in source_paths.iter().enumerate() {
            if cancel.is_cancelled() {
                outcomes.push((index, Outcome::Skipped(source.clone())));
                continue;
            }

            let target = match rule.output_name(source) {
                Ok(name) => output_dir.join(name),
                Err(e) => {
                    error!("Cannot export {:?}: {}", source, e);
                    outcomes.push((
                        index,
                        Outcome::Failed(ExportFailure {
                            source: source.clone(),
                            target: None,
                            error: e,
                        }),
                    ));
                    continue;
                }
            };

            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = cancel.cancelled() => {
                    outcomes.push((index, Outcome::Skipped(source.clone())));
                    continue;
                }
            };

            let image = rendered.clone();
            let icc_profile = icc_profile.clone();
            let source = source.clone();
            let format = rule.output_format;
            let quality = self.jpeg_quality;
            let cancel = cancel.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                if cancel.is_cancelled() {
                    return (index, Outcome::Skipped(source));
                }

                debug!("Writing {:?} -> {:?}", source, target);
                let result = formats::save(
                    &image,
                    &target,
                    format,
                    quality,
                    icc_profile.as_deref().map(Vec::as_slice),
                );
                match result {
                    Ok(()) => (index, Outcome::Written(target)),
                    Err(e) => {
                        error!("Failed to write {:?}: {}", target, e);
                        (
                            index,
                            Outcome::Failed(ExportFailure {
                                source,
                                target: Some(target),
                                error: e,
                            }),
                        )
                    }
                }
            });
        }

        let mut worker_errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Export worker failed: {}", e);
                    worker_errors.push(e);
                }
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        let mut report = ExportReport {
            cancelled: cancel.is_cancelled(),
            ..ExportReport::default()
        };

        // A panicked worker leaves a gap in the indices; report it as a failure.
        let mut lost_worker = |source: &Path| ExportFailure {
            source: source.to_path_buf(),
            target: None,
            error: worker_errors.pop().map_or_else(
                || ExportError::Validation("export worker did not report a result".to_string()),
                ExportError::Join,
            ),
        };

        let mut next = 0;
        for (index, outcome) in outcomes {
            for missing in &source_paths[next..index] {
                report.failed.push(lost_worker(missing.as_path()));
            }
            next = index + 1;
            match outcome {
                Outcome::Written(path) => report.written.push(path),
                Outcome::Failed(failure) => report.failed.push(failure),
                Outcome::Skipped(path) => report.skipped.push(path),
            }
        }
        for missing in &source_paths[next..] {
            report.failed.push(lost_worker(missing.as_path()));
        }

        if report.is_complete() {
            info!("Export finished: {}", report.summary());
        } else {
            warn!("Export finished with problems: {}", report.summary());
        }
        Ok(report)
    }
}

fn contains_separator(text: &str) -> bool {
    text.contains('/') || text.contains('\\')
}

/// The chosen output directory must exist and must not be the folder any
/// source image lives in, so originals can never be overwritten.
fn validate_output_dir(
    rule: &ExportRule,
    active_source: &Path,
    source_paths: &[PathBuf],
) -> Result<PathBuf, ExportError> {
    let output_dir = rule
        .output_dir
        .as_ref()
        .filter(|dir| !dir.as_os_str().is_empty())
        .ok_or_else(|| ExportError::Validation("no output directory chosen".to_string()))?;

    if !output_dir.is_dir() {
        return Err(ExportError::Validation(format!(
            "output directory does not exist: {:?}",
            output_dir
        )));
    }

    let resolved_output = resolve(output_dir);
    let sources = std::iter::once(active_source).chain(source_paths.iter().map(PathBuf::as_path));
    for source in sources {
        if let Some(parent) = source.parent()
            && resolve(parent) == resolved_output
        {
            return Err(ExportError::Validation(format!(
                "output directory {:?} is the source directory of {:?}",
                output_dir, source
            )));
        }
    }

    Ok(output_dir.clone())
}

fn resolve(path: &Path) -> PathBuf {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
