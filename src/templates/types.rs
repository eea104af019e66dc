use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TemplateError;
use crate::watermark::{
    Anchor, Color, PlacementConfig, PlacementMode, Point, WatermarkStyle,
};

/// Version written into every record. Records from a newer version are rejected.
pub const RECORD_VERSION: u32 = 1;

const CUSTOM_MODE: &str = "custom";

/// A named, persisted bundle of style and placement settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub style: WatermarkStyle,
    pub placement: PlacementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TemplateRecord {
    pub version: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    pub style: StyleRecord,
    pub placement: PlacementRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StyleRecord {
    pub text: String,
    pub font_family: String,
    pub font_size_pt: u32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    /// Packed `0xRRGGBBAA`.
    pub color: u32,
    pub opacity: u8,
    #[serde(default)]
    pub shadow_enabled: bool,
    #[serde(default)]
    pub outline_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PlacementRecord {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_point: Option<Point>,
    #[serde(default)]
    pub rotation_degrees: i32,
}

/// Pointer to the most recently saved template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LastUsedRecord {
    pub version: u32,
    pub name: String,
}

impl TemplateRecord {
    pub fn new(name: &str, style: &WatermarkStyle, placement: &PlacementConfig) -> Self {
        let (mode, custom_point) = match placement.mode {
            PlacementMode::Anchor(anchor) => (anchor.as_str().to_string(), None),
            PlacementMode::Custom(point) => (CUSTOM_MODE.to_string(), Some(point)),
        };

        Self {
            version: RECORD_VERSION,
            name: name.to_string(),
            saved_at: Some(Utc::now()),
            style: StyleRecord {
                text: style.text.clone(),
                font_family: style.font_family.clone(),
                font_size_pt: style.font_size_pt,
                bold: style.bold,
                italic: style.italic,
                color: style.color.to_packed_rgba(),
                opacity: style.opacity,
                shadow_enabled: style.shadow_enabled,
                outline_enabled: style.outline_enabled,
            },
            placement: PlacementRecord {
                mode,
                custom_point,
                rotation_degrees: placement.rotation_degrees,
            },
        }
    }

    /// Convert back into runtime types. `name` is the key the record was stored
    /// under, which wins over the name recorded inside the file.
    pub fn into_template(self, name: &str) -> Result<Template, TemplateError> {
        if self.version > RECORD_VERSION {
            return Err(TemplateError::InvalidRecord(format!(
                "template '{}' has unsupported version {}",
                name, self.version
            )));
        }

        let mode = if self.placement.mode == CUSTOM_MODE {
            let point = self.placement.custom_point.ok_or_else(|| {
                TemplateError::InvalidRecord(format!(
                    "template '{}' uses custom placement without a point",
                    name
                ))
            })?;
            PlacementMode::Custom(point)
        } else {
            let anchor = self
                .placement
                .mode
                .parse::<Anchor>()
                .map_err(TemplateError::InvalidRecord)?;
            PlacementMode::Anchor(anchor)
        };

        let mut placement = PlacementConfig {
            mode,
            rotation_degrees: 0,
        };
        placement.set_rotation(self.placement.rotation_degrees);

        let record = self.style;
        let mut style = WatermarkStyle {
            text: record.text,
            font_family: record.font_family,
            font_size_pt: record.font_size_pt,
            bold: record.bold,
            italic: record.italic,
            color: Color::from_packed_rgba(record.color),
            opacity: record.opacity,
            shadow_enabled: record.shadow_enabled,
            outline_enabled: record.outline_enabled,
        };
        style.set_font_size(record.font_size_pt);

        Ok(Template {
            name: name.to_string(),
            style,
            placement,
        })
    }
}
