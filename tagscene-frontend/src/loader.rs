use std::path::Path;

use tagscene_config::AppConfig;
use tagscene_core::document::{Document, EntityMetrics};
use tagscene_engine::scene::EditorSettings;
use tagscene_io::{JsonProjectFormat, ProjectLoader, RestoreOptions};
use tracing::info;

use crate::errors::FrontendError;
use crate::resource_locator::ImageLocator;

/// 由配置生成编辑器参数。
pub fn editor_settings(config: &AppConfig) -> EditorSettings {
    let editor = &config.editor;
    let canvas = &config.canvas;
    EditorSettings {
        undo_limit: editor.undo_limit,
        nudge_step: editor.nudge_step,
        fine_nudge_step: editor.fine_nudge_step,
        min_rectangle_size: editor.min_rectangle_size,
        distribute_tolerance: editor.distribute_tolerance,
        canvas_width: canvas.width,
        canvas_height: canvas.height,
        metrics: EntityMetrics {
            circle_radius: canvas.circle_radius,
            label_char_width: canvas.label_char_width,
            label_line_height: canvas.label_line_height,
            label_padding: canvas.label_padding,
        },
    }
}

pub fn restore_options(config: &AppConfig) -> RestoreOptions {
    RestoreOptions {
        fallback_rectangle_width: config.canvas.fallback_rectangle_width,
        fallback_rectangle_height: config.canvas.fallback_rectangle_height,
    }
}

/// 读取项目文件并在 `blank` 上重建文档。
///
/// 解析或校验失败时直接返回错误，调用方持有的场景不会被触碰。
pub fn load_project(
    path: &Path,
    blank: Document,
    config: &AppConfig,
) -> Result<Document, FrontendError> {
    let project = JsonProjectFormat::new().load(path)?;
    let locator = ImageLocator::from_config(path.parent(), config);
    let document = project.build_document(blank, &restore_options(config), |raw| {
        locator.locate_background(raw)
    })?;
    info!(
        path = %path.display(),
        entities = document.entity_count(),
        background = document.background().is_image(),
        "项目已载入"
    );
    Ok(document)
}
