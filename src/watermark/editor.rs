use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::WatermarkError;
use super::placement::DragSession;
use super::render::render;
use super::text::TextRasterizer;
use super::types::{Anchor, Color, PlacementConfig, Point, WatermarkStyle};
use crate::export::{BatchExporter, ExportError, ExportReport, ExportRule};
use crate::templates::Template;

/// A single user edit. Every change to the editing state goes through
/// [`WatermarkEditor::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    SetText(String),
    SetFontFamily(String),
    SetFontSize(u32),
    SetBold(bool),
    SetItalic(bool),
    SetColor(Color),
    SetOpacity(i32),
    SetShadow(bool),
    SetOutline(bool),
    SetAnchor(Anchor),
    SetRotation(i32),
    /// Pointer-down on the preview, in image coordinates.
    DragStart(Point),
    DragMove(Point),
    DragEnd,
}

/// Editing session over a list of imported images.
///
/// Holds the pristine decode of the selected image; every preview and commit is
/// rendered from it, never from a previous composite.
pub struct WatermarkEditor {
    rasterizer: Arc<dyn TextRasterizer + Send + Sync>,
    style: WatermarkStyle,
    placement: PlacementConfig,
    drag: Option<DragSession>,
    sources: Vec<PathBuf>,
    selected: Option<usize>,
    original: Option<DynamicImage>,
    preview: Option<DynamicImage>,
    committed: Option<Arc<DynamicImage>>,
}

impl WatermarkEditor {
    pub fn new(rasterizer: Arc<dyn TextRasterizer + Send + Sync>) -> Self {
        Self {
            rasterizer,
            style: WatermarkStyle::default(),
            placement: PlacementConfig::default(),
            drag: None,
            sources: Vec::new(),
            selected: None,
            original: None,
            preview: None,
            committed: None,
        }
    }

    pub fn style(&self) -> &WatermarkStyle {
        &self.style
    }

    pub fn placement(&self) -> &PlacementConfig {
        &self.placement
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selected
            .and_then(|index| self.sources.get(index))
            .map(PathBuf::as_path)
    }

    pub fn original(&self) -> Option<&DynamicImage> {
        self.original.as_ref()
    }

    pub fn preview_image(&self) -> Option<&DynamicImage> {
        self.preview.as_ref()
    }

    /// The composite that export will write, if one has been committed.
    pub fn rendered(&self) -> Option<Arc<DynamicImage>> {
        self.committed.clone()
    }

    pub fn apply(&mut self, command: EditCommand) {
        debug!("Applying {:?}", command);
        match command {
            EditCommand::SetText(text) => self.style.set_text(text),
            EditCommand::SetFontFamily(family) => self.style.set_font_family(family),
            EditCommand::SetFontSize(size) => self.style.set_font_size(size),
            EditCommand::SetBold(bold) => self.style.bold = bold,
            EditCommand::SetItalic(italic) => self.style.italic = italic,
            EditCommand::SetColor(color) => self.style.color = color,
            EditCommand::SetOpacity(opacity) => self.style.set_opacity(opacity),
            EditCommand::SetShadow(enabled) => self.style.shadow_enabled = enabled,
            EditCommand::SetOutline(enabled) => self.style.outline_enabled = enabled,
            EditCommand::SetAnchor(anchor) => {
                self.drag = None;
                self.placement.select_anchor(anchor);
            }
            EditCommand::SetRotation(degrees) => self.placement.set_rotation(degrees),
            EditCommand::DragStart(pointer) => {
                self.drag = Some(DragSession::begin(&self.placement, pointer));
            }
            EditCommand::DragMove(pointer) => {
                // Moves without a preceding pointer-down are ignored.
                if let Some(drag) = self.drag.as_mut() {
                    drag.drag_to(&mut self.placement, pointer);
                }
            }
            EditCommand::DragEnd => self.drag = None,
        }
    }

    /// Apply `command` and refresh the preview when there is something to draw.
    pub fn update(&mut self, command: EditCommand) -> Result<(), WatermarkError> {
        self.apply(command);
        if self.original.is_some() && !self.style.text.trim().is_empty() {
            self.preview()?;
        }
        Ok(())
    }

    /// Replace the imported image list. Selects the first entry when there is one.
    pub fn set_sources(&mut self, sources: Vec<PathBuf>) -> Result<(), WatermarkError> {
        self.sources = sources;
        self.selected = None;
        self.original = None;
        self.preview = None;
        self.committed = None;
        if self.sources.is_empty() {
            return Ok(());
        }
        self.select(0)
    }

    /// Decode the source at `index` as the new active image. Any preview or
    /// committed composite belongs to the previous image and is dropped.
    pub fn select(&mut self, index: usize) -> Result<(), WatermarkError> {
        let path = self.sources.get(index).ok_or_else(|| {
            WatermarkError::Validation(format!(
                "no source at index {} ({} imported)",
                index,
                self.sources.len()
            ))
        })?;

        let image = image::open(path)?;
        info!(
            "Selected {:?} ({}x{})",
            path,
            image.width(),
            image.height()
        );

        self.selected = Some(index);
        self.original = Some(image);
        self.preview = None;
        self.committed = None;
        Ok(())
    }

    /// Render the current settings onto the selected image and keep the result
    /// as the preview.
    pub fn preview(&mut self) -> Result<&DynamicImage, WatermarkError> {
        let image = self.render_current()?;
        Ok(&*self.preview.insert(image))
    }

    /// Render the current settings and commit the result as the image export writes.
    pub fn apply_watermark(&mut self) -> Result<Arc<DynamicImage>, WatermarkError> {
        let image = Arc::new(self.render_current()?);
        self.preview = Some((*image).clone());
        self.committed = Some(image.clone());
        Ok(image)
    }

    /// Restore style and placement from a stored template. A drag in progress is abandoned.
    pub fn load_template(&mut self, template: &Template) {
        info!("Loaded template '{}'", template.name);
        self.style = template.style.clone();
        self.placement = template.placement;
        self.drag = None;
    }

    /// Current style and placement, in the shape the template store saves.
    pub fn snapshot(&self) -> (WatermarkStyle, PlacementConfig) {
        (self.style.clone(), self.placement)
    }

    /// Export the committed composite for every imported source.
    pub async fn export(
        &self,
        exporter: &BatchExporter,
        rule: &ExportRule,
        cancel: &CancellationToken,
    ) -> Result<ExportReport, ExportError> {
        let active = self
            .selected_path()
            .ok_or_else(|| ExportError::Validation("no image selected".to_string()))?;
        exporter
            .export(self.committed.clone(), active, &self.sources, rule, cancel)
            .await
    }

    fn render_current(&self) -> Result<DynamicImage, WatermarkError> {
        let original = self
            .original
            .as_ref()
            .ok_or_else(|| WatermarkError::Validation("no image selected".to_string()))?;
        render(
            original,
            &self.style,
            &self.placement,
            self.rasterizer.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{NamingMode, OutputFormat};
    use crate::watermark::testing::BlockRasterizer;
    use crate::watermark::types::PlacementMode;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn editor() -> WatermarkEditor {
        WatermarkEditor::new(Arc::new(BlockRasterizer))
    }

    fn write_image(path: &Path, width: u32, height: u32, shade: u8) {
        RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255]))
            .save(path)
            .unwrap();
    }

    fn imported(dir: &TempDir) -> Vec<PathBuf> {
        let photos = dir.path().join("photos");
        std::fs::create_dir_all(&photos).unwrap();
        let a = photos.join("a.png");
        let b = photos.join("b.png");
        write_image(&a, 160, 120, 40);
        write_image(&b, 80, 60, 200);
        vec![a, b]
    }

    #[test]
    fn test_setters_clamp() {
        let mut editor = editor();
        editor.apply(EditCommand::SetOpacity(999));
        editor.apply(EditCommand::SetFontSize(1));
        editor.apply(EditCommand::SetRotation(-400));

        assert_eq!(editor.style().opacity, 255);
        assert_eq!(editor.style().font_size_pt, 8);
        assert_eq!(editor.placement().rotation_degrees, -180);
    }

    #[test]
    fn test_drag_moves_by_pointer_delta() {
        let mut editor = editor();
        editor.apply(EditCommand::DragStart(Point::new(50, 50)));
        assert!(editor.is_dragging());
        // Pointer-down alone does not switch to custom placement.
        assert_eq!(editor.placement().anchor(), Some(Anchor::BottomRight));

        editor.apply(EditCommand::DragMove(Point::new(60, 45)));
        assert_eq!(editor.placement().custom_point(), Some(Point::new(60, 45)));

        editor.apply(EditCommand::DragMove(Point::new(70, 40)));
        editor.apply(EditCommand::DragEnd);
        assert!(!editor.is_dragging());
        assert_eq!(editor.placement().custom_point(), Some(Point::new(70, 40)));
    }

    #[test]
    fn test_second_drag_continues_from_custom_point() {
        let mut editor = editor();
        editor.apply(EditCommand::DragStart(Point::new(10, 10)));
        editor.apply(EditCommand::DragMove(Point::new(20, 20)));
        editor.apply(EditCommand::DragEnd);

        // Grab the watermark somewhere else; it moves by the delta, not to the pointer.
        editor.apply(EditCommand::DragStart(Point::new(100, 100)));
        editor.apply(EditCommand::DragMove(Point::new(105, 90)));
        assert_eq!(editor.placement().custom_point(), Some(Point::new(25, 10)));
    }

    #[test]
    fn test_move_without_drag_is_ignored() {
        let mut editor = editor();
        editor.apply(EditCommand::DragMove(Point::new(5, 5)));
        assert!(!editor.placement().is_custom());
    }

    #[test]
    fn test_anchor_after_drag_clears_custom_point() {
        let mut editor = editor();
        editor.apply(EditCommand::DragStart(Point::new(0, 0)));
        editor.apply(EditCommand::DragMove(Point::new(3, 4)));
        editor.apply(EditCommand::SetAnchor(Anchor::TopLeft));

        assert!(!editor.is_dragging());
        assert_eq!(editor.placement().mode, PlacementMode::Anchor(Anchor::TopLeft));
    }

    #[test]
    fn test_preview_requires_image_and_text() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor();
        editor.apply(EditCommand::SetText("hi".to_string()));
        assert!(matches!(editor.preview(), Err(WatermarkError::Validation(_))));

        editor.set_sources(imported(&dir)).unwrap();
        editor.apply(EditCommand::SetText(String::new()));
        assert!(matches!(editor.preview(), Err(WatermarkError::Validation(_))));

        editor.apply(EditCommand::SetText("hi".to_string()));
        assert!(editor.preview().is_ok());
        assert!(editor.rendered().is_none());
    }

    #[test]
    fn test_update_refreshes_preview() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor();
        editor.set_sources(imported(&dir)).unwrap();

        editor.update(EditCommand::SetOpacity(255)).unwrap();
        assert!(editor.preview_image().is_none());

        editor.update(EditCommand::SetText("mark".to_string())).unwrap();
        let first = editor.preview_image().unwrap().to_rgba8();
        editor.update(EditCommand::SetAnchor(Anchor::TopLeft)).unwrap();
        let second = editor.preview_image().unwrap().to_rgba8();
        assert_ne!(first, second);
    }

    #[test]
    fn test_select_clears_committed_result() {
        let dir = TempDir::new().unwrap();
        let mut editor = editor();
        editor.set_sources(imported(&dir)).unwrap();
        editor.apply(EditCommand::SetText("x".to_string()));
        editor.apply_watermark().unwrap();
        assert!(editor.rendered().is_some());

        editor.select(1).unwrap();
        assert!(editor.rendered().is_none());
        assert!(editor.preview_image().is_none());
        assert_eq!(editor.original().unwrap().width(), 80);
        assert!(matches!(editor.select(7), Err(WatermarkError::Validation(_))));
    }

    #[test]
    fn test_snapshot_and_load_template() {
        let mut editor = editor();
        editor.apply(EditCommand::SetText("saved".to_string()));
        editor.apply(EditCommand::SetAnchor(Anchor::Center));
        let (style, placement) = editor.snapshot();

        let mut other = WatermarkEditor::new(Arc::new(BlockRasterizer));
        other.apply(EditCommand::DragStart(Point::new(1, 1)));
        other.load_template(&Template {
            name: "t".to_string(),
            style: style.clone(),
            placement,
        });
        assert!(!other.is_dragging());
        assert_eq!(other.style(), &style);
        assert_eq!(other.placement(), &placement);
    }

    #[tokio::test]
    async fn test_export_writes_committed_image() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let mut editor = editor();
        editor.set_sources(imported(&dir)).unwrap();
        editor.apply(EditCommand::SetText("©".to_string()));

        let rule = ExportRule {
            naming_mode: NamingMode::Prefix,
            affix_text: String::new(),
            output_format: OutputFormat::Png,
            output_dir: Some(out.clone()),
        };
        let cancel = CancellationToken::new();

        let err = editor
            .export(&BatchExporter::default(), &rule, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Validation(_)));

        let committed = editor.apply_watermark().unwrap();
        let report = editor
            .export(&BatchExporter::default(), &rule, &cancel)
            .await
            .unwrap();
        assert_eq!(report.written.len(), 2);

        // Both outputs carry the active image's composite, including its size.
        let b = image::open(out.join("wm_b.png")).unwrap();
        assert_eq!(b.to_rgba8(), committed.to_rgba8());
    }
}
