use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use watermark_studio::export::{BatchExporter, ExportError, ExportRule, NamingMode, OutputFormat};
use watermark_studio::import;
use watermark_studio::watermark::{
    Anchor, EditCommand, FontSpec, TextRasterizer, WatermarkEditor, WatermarkError, blend_over,
};

/// Solid 6x8 box per character above the baseline.
struct BoxRasterizer;

impl TextRasterizer for BoxRasterizer {
    fn measure(&self, text: &str, _font: &FontSpec) -> Result<(u32, u32), WatermarkError> {
        Ok((text.chars().count() as u32 * 6, 8))
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        x: i32,
        y: i32,
        text: &str,
        font: &FontSpec,
        color: Rgba<u8>,
    ) -> Result<(), WatermarkError> {
        let (w, h) = self.measure(text, font)?;
        for py in (y - h as i32).max(0)..y.min(canvas.height() as i32) {
            for px in x.max(0)..(x + w as i32).min(canvas.width() as i32) {
                let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                *pixel = blend_over(*pixel, color);
            }
        }
        Ok(())
    }
}

struct Workspace {
    _temp_dir: TempDir,
    photos: PathBuf,
    out: PathBuf,
}

fn workspace() -> Workspace {
    let temp_dir = TempDir::new().unwrap();
    let photos = temp_dir.path().join("photos");
    let out = temp_dir.path().join("out");
    std::fs::create_dir_all(&photos).unwrap();
    std::fs::create_dir_all(&out).unwrap();

    RgbImage::from_pixel(200, 100, Rgb([30, 30, 30]))
        .save(photos.join("beach.png"))
        .unwrap();
    RgbImage::from_pixel(50, 40, Rgb([220, 220, 220]))
        .save(photos.join("city.jpg"))
        .unwrap();
    RgbImage::from_pixel(64, 64, Rgb([0, 0, 255]))
        .save(photos.join("forest.bmp"))
        .unwrap();
    std::fs::write(photos.join("notes.txt"), "not an image").unwrap();

    Workspace {
        _temp_dir: temp_dir,
        photos,
        out,
    }
}

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

fn session(photos: &Path) -> WatermarkEditor {
    let sources = import::collect_image_paths(&[photos.to_path_buf()]).unwrap();
    let mut editor = WatermarkEditor::new(Arc::new(BoxRasterizer));
    editor.set_sources(sources).unwrap();
    editor.apply(EditCommand::SetText("WM".to_string()));
    editor.apply(EditCommand::SetOpacity(255));
    editor.apply(EditCommand::SetAnchor(Anchor::TopLeft));
    editor
}

#[tokio::test]
async fn test_folder_export_with_suffix_jpeg() {
    let ws = workspace();
    let mut editor = session(&ws.photos);
    assert_eq!(names(editor.sources()), vec!["beach.png", "city.jpg", "forest.bmp"]);
    editor.apply_watermark().unwrap();

    let rule = ExportRule {
        naming_mode: NamingMode::Suffix,
        affix_text: String::new(),
        output_format: OutputFormat::Jpeg,
        output_dir: Some(ws.out.clone()),
    };
    let report = editor
        .export(&BatchExporter::default(), &rule, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_complete(), "{}", report.summary());
    assert_eq!(
        names(&report.written),
        vec![
            "beach_watermarked.jpeg",
            "city_watermarked.jpeg",
            "forest_watermarked.jpeg"
        ]
    );

    // Every output is the active image's composite, so all share its size.
    for path in &report.written {
        let written = image::open(path).unwrap();
        assert_eq!(written.dimensions(), (200, 100));
        assert!(!written.color().has_alpha());
    }
}

#[tokio::test]
async fn test_custom_prefix_png_matches_committed_pixels() {
    let ws = workspace();
    let mut editor = session(&ws.photos);
    editor.select(2).unwrap();
    let committed = editor.apply_watermark().unwrap();

    let rule = ExportRule {
        naming_mode: NamingMode::Prefix,
        affix_text: "final-".to_string(),
        output_format: OutputFormat::Png,
        output_dir: Some(ws.out.clone()),
    };
    let report = editor
        .export(&BatchExporter::default(), &rule, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        names(&report.written),
        vec!["final-beach.png", "final-city.png", "final-forest.png"]
    );
    for path in &report.written {
        assert_eq!(image::open(path).unwrap().to_rgba8(), committed.to_rgba8());
    }
    // Watermark sits at the top-left margin of the 64x64 active image.
    assert_eq!(committed.to_rgba8().get_pixel(31, 31), &Rgba([255, 255, 255, 255]));
}

#[tokio::test]
async fn test_export_into_source_folder_is_rejected() {
    let ws = workspace();
    let mut editor = session(&ws.photos);
    editor.apply_watermark().unwrap();

    let rule = ExportRule {
        naming_mode: NamingMode::KeepOriginal,
        affix_text: String::new(),
        output_format: OutputFormat::Png,
        output_dir: Some(ws.photos.clone()),
    };
    let result = editor
        .export(&BatchExporter::default(), &rule, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ExportError::Validation(_))));
    let untouched = std::fs::read_dir(&ws.photos).unwrap().count();
    assert_eq!(untouched, 4);
}

#[tokio::test]
async fn test_reselect_requires_new_commit() {
    let ws = workspace();
    let mut editor = session(&ws.photos);
    editor.apply_watermark().unwrap();
    editor.select(1).unwrap();

    let rule = ExportRule {
        output_dir: Some(ws.out.clone()),
        ..ExportRule::default()
    };
    let result = editor
        .export(&BatchExporter::default(), &rule, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ExportError::Validation(_))));
    assert_eq!(std::fs::read_dir(&ws.out).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cancelled_export_skips_everything() {
    let ws = workspace();
    let mut editor = session(&ws.photos);
    editor.apply_watermark().unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let rule = ExportRule {
        output_dir: Some(ws.out.clone()),
        ..ExportRule::default()
    };
    let report = editor
        .export(&BatchExporter::default(), &rule, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.written.is_empty());
    assert_eq!(report.skipped.len(), 3);
    assert!(!report.is_complete());
}
