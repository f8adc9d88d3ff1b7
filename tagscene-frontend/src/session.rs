//! 一次编辑会话：编辑器、当前项目路径，以及文件类意图（新建、打开、保存、导入背景）。

use std::path::{Path, PathBuf};

use tagscene_config::AppConfig;
use tagscene_engine::scene::{Editor, Feedback};
use tagscene_io::{JsonProjectFormat, ProjectSaver};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{editor_settings, load_project};
use crate::resource_locator::ImageLocator;

/// 文件选择器的用途。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Project,
    Image,
}

/// 会话依赖的外部交互：文件选择与消息提示。返回 `None` 表示用户取消。
pub trait Dialogs {
    fn pick_open(&mut self, kind: FileKind) -> Option<PathBuf>;
    fn pick_save(&mut self, kind: FileKind) -> Option<PathBuf>;
    fn message(&mut self, title: &str, text: &str);
}

pub struct Session {
    editor: Editor,
    config: AppConfig,
    current_path: Option<PathBuf>,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        Self {
            editor: Editor::with_settings(editor_settings(&config)),
            config,
            current_path: None,
        }
    }

    #[inline]
    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    #[inline]
    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 最近一次打开或保存的项目路径。
    #[inline]
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn new_project(&mut self) -> Feedback {
        self.current_path = None;
        self.editor.new_project()
    }

    /// 打开项目。失败时当前场景与路径保持不变。
    pub fn open(&mut self, path: &Path) -> Result<Feedback, FrontendError> {
        let blank = self.editor.document().empty_like();
        let document = load_project(path, blank, &self.config)?;
        self.current_path = Some(path.to_path_buf());
        Ok(self.editor.load_document(document))
    }

    pub fn open_with(
        &mut self,
        dialogs: &mut dyn Dialogs,
    ) -> Result<Option<Feedback>, FrontendError> {
        let Some(path) = dialogs.pick_open(FileKind::Project) else {
            return Ok(None);
        };
        self.open(&path)
            .map(Some)
            .inspect_err(|err| dialogs.message("Load Error", &err.to_string()))
    }

    pub fn save_to(&mut self, path: &Path) -> Result<(), FrontendError> {
        JsonProjectFormat::new().save(self.editor.document(), path)?;
        self.current_path = Some(path.to_path_buf());
        Ok(())
    }

    /// 保存到当前路径；尚无路径时询问保存位置。返回实际写入的路径，取消时为 `None`。
    pub fn save(&mut self, dialogs: &mut dyn Dialogs) -> Result<Option<PathBuf>, FrontendError> {
        match self.current_path.clone() {
            Some(path) => self.save_with_report(path, dialogs).map(Some),
            None => self.save_as(dialogs),
        }
    }

    /// 总是询问保存位置。
    pub fn save_as(
        &mut self,
        dialogs: &mut dyn Dialogs,
    ) -> Result<Option<PathBuf>, FrontendError> {
        let Some(path) = dialogs.pick_save(FileKind::Project) else {
            info!("保存已取消");
            return Ok(None);
        };
        self.save_with_report(path, dialogs).map(Some)
    }

    /// 导入背景图片，作为可撤销的一步。
    pub fn import_image(&mut self, path: &Path) -> Result<Feedback, FrontendError> {
        let base = self.current_path.as_deref().and_then(Path::parent);
        let locator = ImageLocator::from_config(base, &self.config);
        let raw = path.to_string_lossy();
        let Some(background) = locator.locate_background(&raw) else {
            warn!(path = %path.display(), "导入背景失败");
            return Err(FrontendError::ImageUnavailable(path.to_path_buf()));
        };
        Ok(self.editor.import_background(background)?)
    }

    pub fn import_image_with(
        &mut self,
        dialogs: &mut dyn Dialogs,
    ) -> Result<Option<Feedback>, FrontendError> {
        let Some(path) = dialogs.pick_open(FileKind::Image) else {
            return Ok(None);
        };
        self.import_image(&path)
            .map(Some)
            .inspect_err(|err| dialogs.message("Error", &err.to_string()))
    }

    fn save_with_report(
        &mut self,
        path: PathBuf,
        dialogs: &mut dyn Dialogs,
    ) -> Result<PathBuf, FrontendError> {
        match self.save_to(&path) {
            Ok(()) => {
                dialogs.message("Saved", &format!("Project saved to {}", path.display()));
                Ok(path)
            }
            Err(err) => {
                dialogs.message("Save Error", &err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;

    use tagscene_core::geometry::Point2;

    use super::*;

    #[derive(Default)]
    struct QueuedDialogs {
        paths: VecDeque<PathBuf>,
        messages: Vec<String>,
    }

    impl Dialogs for QueuedDialogs {
        fn pick_open(&mut self, _kind: FileKind) -> Option<PathBuf> {
            self.paths.pop_front()
        }

        fn pick_save(&mut self, _kind: FileKind) -> Option<PathBuf> {
            self.paths.pop_front()
        }

        fn message(&mut self, title: &str, _text: &str) {
            self.messages.push(title.to_string());
        }
    }

    fn session_with_circle() -> Session {
        let mut session = Session::new(AppConfig::default());
        let editor = session.editor_mut();
        editor.begin_add_circle("A").unwrap();
        editor.place_at(Point2::new(50.0, 60.0)).unwrap();
        session
    }

    #[test]
    fn save_asks_once_then_reuses_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("scene.json");
        let mut session = session_with_circle();
        let mut dialogs = QueuedDialogs::default();

        assert_eq!(session.save(&mut dialogs).unwrap(), None);
        assert!(session.current_path().is_none());

        dialogs.paths.push_back(target.clone());
        assert_eq!(session.save(&mut dialogs).unwrap(), Some(target.clone()));
        assert_eq!(session.current_path(), Some(target.as_path()));

        // 第二次保存不再询问
        assert_eq!(session.save(&mut dialogs).unwrap(), Some(target.clone()));
        assert_eq!(dialogs.messages, vec!["Saved", "Saved"]);
    }

    #[test]
    fn open_replaces_scene_and_resets_history() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("scene.json");
        let mut session = session_with_circle();
        session.save_to(&target).unwrap();

        let mut other = Session::new(AppConfig::default());
        other.editor_mut().begin_add_circle("Z").unwrap();
        other.editor_mut().place_at(Point2::new(1.0, 1.0)).unwrap();
        let feedback = other.open(&target).unwrap();
        assert_eq!(feedback.active_circle, None);
        assert!(!other.editor().history().can_undo());
        assert!(other.editor().document().registry().circle_exists("A"));
        assert!(!other.editor().document().registry().circle_exists("Z"));
        assert_eq!(other.current_path(), Some(target.as_path()));
    }

    #[test]
    fn failed_open_keeps_scene_intact() {
        let dir = tempfile::tempdir().unwrap();
        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{\"items\": [").unwrap();

        let mut session = session_with_circle();
        let mut dialogs = QueuedDialogs::default();
        dialogs.paths.push_back(corrupt);
        assert!(session.open_with(&mut dialogs).is_err());
        assert_eq!(dialogs.messages, vec!["Load Error"]);
        assert_eq!(session.editor().document().entity_count(), 1);
        assert!(session.editor().history().can_undo());
        assert!(session.current_path().is_none());
    }

    #[test]
    fn image_import_is_undoable() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("bg.png");
        image::RgbImage::new(320, 240).save(&image_path).unwrap();

        let mut session = Session::new(AppConfig::default());
        session.import_image(&image_path).unwrap();
        assert_eq!(session.editor().document().scene_bounds().width(), 320.0);
        session.editor_mut().undo().unwrap();
        assert_eq!(session.editor().document().scene_bounds().width(), 1000.0);

        let err = session.import_image(&dir.path().join("none.png")).unwrap_err();
        assert!(matches!(err, FrontendError::ImageUnavailable(_)));
    }

    #[test]
    fn image_import_accepts_working_directory_paths() {
        let file = tempfile::Builder::new()
            .prefix("session-bg-")
            .suffix(".png")
            .tempfile_in(".")
            .unwrap();
        image::RgbImage::new(32, 16).save(file.path()).unwrap();
        let relative = PathBuf::from(file.path().file_name().unwrap());
        assert!(relative.is_relative() && relative.exists());

        let mut session = Session::new(AppConfig::default());
        session.import_image(&relative).unwrap();
        assert_eq!(session.editor().document().scene_bounds().width(), 32.0);
        assert_eq!(session.editor().document().scene_bounds().height(), 16.0);
    }

    #[test]
    fn new_project_forgets_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with_circle();
        session.save_to(&dir.path().join("a.json")).unwrap();
        session.new_project();
        assert!(session.current_path().is_none());
        assert!(session.editor().document().is_empty());
    }
}
