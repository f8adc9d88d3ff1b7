use std::fs;
use std::path::{Path, PathBuf};

use image::ImageReader;
use serde::{Deserialize, Deserializer, Serialize};
use tagscene_core::document::{Background, Circle, Document, Entity, EntityKind, Label, Rectangle};
use tagscene_core::geometry::Point2;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 旧版本项目文件缺少矩形尺寸时使用的默认宽高。
pub const FALLBACK_RECTANGLE_WIDTH: f64 = 100.0;
pub const FALLBACK_RECTANGLE_HEIGHT: f64 = 60.0;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse project {path:?}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode project: {0}")]
    EncodeError(#[source] serde_json::Error),
    #[error("failed to read image {path:?}: {source}")]
    ImageError {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait ProjectLoader {
    fn load(&self, path: &Path) -> Result<ProjectFile, IoError>;
}

pub trait ProjectSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 项目文件的持久化模型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub background_image: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub x: f64,
    pub y: f64,
    pub id: String,
    #[serde(
        default,
        deserialize_with = "text_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub rect_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<f64>,
}

/// 还原文档时使用的参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestoreOptions {
    pub fallback_rectangle_width: f64,
    pub fallback_rectangle_height: f64,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            fallback_rectangle_width: FALLBACK_RECTANGLE_WIDTH,
            fallback_rectangle_height: FALLBACK_RECTANGLE_HEIGHT,
        }
    }
}

impl ProjectFile {
    /// 按层叠顺序导出全部实体。预览与背景不属于实体，不会出现在 `items` 中。
    pub fn from_document(document: &Document) -> Self {
        let items = document
            .entities()
            .map(|(_, entity)| ItemRecord::from_entity(entity))
            .collect();
        let background_image = document
            .background()
            .path()
            .map(|path| path.to_string_lossy().into_owned());
        Self {
            background_image,
            items,
        }
    }

    pub fn from_json(data: &str, path: &Path) -> Result<Self, IoError> {
        serde_json::from_str(data).map_err(|source| IoError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> Result<String, IoError> {
        serde_json::to_string_pretty(self).map_err(IoError::EncodeError)
    }

    /// 在 `blank` 上重建文档。
    ///
    /// 所有条目先全部校验，任一条目非法则整体失败，调用方的现有场景不受影响。
    /// 背景路径交给 `resolve_background` 解析；无法解析时退回默认背景。
    pub fn build_document<F>(
        &self,
        blank: Document,
        options: &RestoreOptions,
        mut resolve_background: F,
    ) -> Result<Document, IoError>
    where
        F: FnMut(&str) -> Option<Background>,
    {
        let entities = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| item.to_entity(index, options))
            .collect::<Result<Vec<_>, _>>()?;

        let mut document = blank;
        for entity in entities {
            document.add_entity(entity);
        }

        if let Some(raw) = self.background_image.as_deref() {
            match resolve_background(raw) {
                Some(background) => {
                    debug!(path = raw, "背景图片已恢复");
                    document.set_background(background);
                }
                None => warn!(path = raw, "背景图片不可用，使用默认背景"),
            }
        }
        Ok(document)
    }
}

impl ItemRecord {
    fn from_entity(entity: &Entity) -> Self {
        let position = entity.position();
        let mut record = Self {
            kind: entity.kind(),
            x: position.x(),
            y: position.y(),
            id: entity.id().to_string(),
            rect_id: None,
            rect_text: None,
            w: None,
            h: None,
        };
        if let Entity::Rectangle(rect) = entity {
            record.rect_id = Some(rect.sub_id.to_string());
            record.rect_text = Some(rect.text.clone());
            record.w = Some(rect.width);
            record.h = Some(rect.height);
        }
        record
    }

    fn to_entity(&self, index: usize, options: &RestoreOptions) -> Result<Entity, IoError> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(invalid(index, "position is not finite"));
        }
        let position = Point2::new(self.x, self.y);
        let entity = match self.kind {
            EntityKind::Circle => Entity::Circle(Circle::new(self.id.clone(), position)),
            EntityKind::Label => Entity::Label(Label::with_id(self.id.clone(), position)),
            EntityKind::Label2 => Entity::Label2(Label::with_id(self.id.clone(), position)),
            EntityKind::Rectangle => {
                let raw = self
                    .rect_id
                    .as_deref()
                    .ok_or_else(|| invalid(index, "rectangle without rect_id"))?;
                let sub_id = raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|value| *value > 0)
                    .ok_or_else(|| invalid(index, &format!("bad rect_id {raw:?}")))?;
                let text = self
                    .rect_text
                    .as_deref()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .ok_or_else(|| invalid(index, "rectangle without rect_text"))?;
                let width = dimension(self.w, options.fallback_rectangle_width, index, "w")?;
                let height = dimension(self.h, options.fallback_rectangle_height, index, "h")?;
                Entity::Rectangle(Rectangle::new(
                    self.id.clone(),
                    sub_id,
                    text,
                    position,
                    width,
                    height,
                ))
            }
        };
        Ok(entity)
    }
}

fn dimension(value: Option<f64>, fallback: f64, index: usize, name: &str) -> Result<f64, IoError> {
    match value {
        None => Ok(fallback),
        Some(value) if value.is_finite() && value > 0.0 => Ok(value),
        Some(value) => Err(invalid(index, &format!("{name} must be positive, got {value}"))),
    }
}

fn invalid(index: usize, message: &str) -> IoError {
    IoError::InvalidDocument(format!("item {index}: {message}"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRectId {
    Text(String),
    Number(u64),
}

/// 兼容把 `rect_id` 写成数字的旧文件。
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawRectId>::deserialize(deserializer)?;
    Ok(raw.map(|raw| match raw {
        RawRectId::Text(text) => text,
        RawRectId::Number(number) => number.to_string(),
    }))
}

/// 读取图片尺寸，生成图片背景。只解析头部，不解码像素。
pub fn probe_background(path: &Path) -> Result<Background, IoError> {
    let reader = ImageReader::open(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = reader
        .with_guessed_format()
        .map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|source| IoError::ImageError {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Background::image(path, width, height))
}

/// JSON 项目文件读写。
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProjectFormat;

impl JsonProjectFormat {
    pub fn new() -> Self {
        Self
    }
}

impl ProjectLoader for JsonProjectFormat {
    fn load(&self, path: &Path) -> Result<ProjectFile, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let project = ProjectFile::from_json(&data, path)?;
        info!(
            path = %path.display(),
            items = project.items.len(),
            "项目文件已读取"
        );
        Ok(project)
    }
}

impl ProjectSaver for JsonProjectFormat {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let project = ProjectFile::from_document(document);
        let data = project.to_json()?;
        fs::write(path, data).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            items = project.items.len(),
            "项目已保存"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_record_writes_rect_id_as_text() {
        let mut document = Document::new();
        document.add_entity(Entity::Rectangle(Rectangle::new(
            "7",
            3,
            "door",
            Point2::new(1.0, 2.0),
            30.0,
            40.0,
        )));
        let json = ProjectFile::from_document(&document).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let item = &value["items"][0];
        assert_eq!(item["type"], "RECTANGLE");
        assert_eq!(item["id"], "7");
        assert_eq!(item["rect_id"], "3");
        assert_eq!(item["rect_text"], "door");
        assert!(value["background_image"].is_null());
    }

    #[test]
    fn circle_record_omits_rectangle_fields() {
        let mut document = Document::new();
        document.add_entity(Entity::Circle(Circle::new("A", Point2::new(5.0, 6.0))));
        let json = ProjectFile::from_document(&document).to_json().unwrap();
        assert!(!json.contains("rect_id"));
        assert!(!json.contains("\"w\""));
    }

    #[test]
    fn invalid_rectangle_rejects_whole_document() {
        let data = r#"{"items":[
            {"type":"CIRCLE","x":0,"y":0,"id":"A"},
            {"type":"RECTANGLE","x":0,"y":0,"id":"A","rect_id":"x","rect_text":"t"}
        ]}"#;
        let project = ProjectFile::from_json(data, Path::new("bad.json")).unwrap();
        let err = project
            .build_document(Document::new(), &RestoreOptions::default(), |_| None)
            .unwrap_err();
        assert!(matches!(err, IoError::InvalidDocument(message) if message.starts_with("item 1")));
    }

    #[test]
    fn non_positive_size_is_rejected() {
        let data = r#"{"items":[
            {"type":"RECTANGLE","x":0,"y":0,"id":"A","rect_id":"1","rect_text":"t","w":0,"h":5}
        ]}"#;
        let project = ProjectFile::from_json(data, Path::new("bad.json")).unwrap();
        assert!(
            project
                .build_document(Document::new(), &RestoreOptions::default(), |_| None)
                .is_err()
        );
    }
}
