use std::env;
use std::path::{Path, PathBuf};

use tagscene_config::AppConfig;
use tagscene_core::document::Background;
use tagscene_io::probe_background;
use tracing::{debug, trace, warn};

const IMAGE_ROOTS_ENV: &str = "TAGSCENE_IMAGE_ROOTS";

/// 背景图片路径解析：绝对路径直接使用，相对路径依次在项目目录、配置的目录与当前工作目录中查找。
pub struct ImageLocator {
    search_roots: Vec<PathBuf>,
}

impl ImageLocator {
    pub fn from_config(base_dir: Option<&Path>, config: &AppConfig) -> Self {
        let mut roots: Vec<PathBuf> = Vec::new();

        if let Some(dir) = base_dir {
            roots.push(dir.to_path_buf());
        }

        roots.extend(
            config
                .resources
                .image_roots
                .iter()
                .cloned()
                .filter(|path| path.is_dir()),
        );

        if let Some(env_paths) = env::var_os(IMAGE_ROOTS_ENV) {
            roots.extend(env::split_paths(&env_paths).filter(|path| path.is_dir()));
        }

        // 去重，保持靠前优先级。
        let mut deduped: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !deduped.contains(&root) {
                deduped.push(root);
            }
        }

        ImageLocator {
            search_roots: deduped,
        }
    }

    #[inline]
    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub fn resolve(&self, path_str: &str) -> Option<PathBuf> {
        let raw_path = Path::new(path_str);
        if raw_path.is_absolute() {
            if raw_path.exists() {
                return Some(Self::canonicalize_or_clone(raw_path));
            }
            debug!(path = %raw_path.display(), "背景图片为绝对路径但文件不存在");
            return None;
        }

        let found = self.search_roots.iter().find_map(|root| {
            let candidate = root.join(raw_path);
            trace!(candidate = %candidate.display(), "image locator candidate");
            candidate
                .exists()
                .then(|| Self::canonicalize_or_clone(&candidate))
        });
        // 最后按当前工作目录解析。
        let found = found.or_else(|| {
            raw_path
                .exists()
                .then(|| Self::canonicalize_or_clone(raw_path))
        });
        if found.is_none() {
            debug!(path = path_str, roots = self.search_roots.len(), "未找到背景图片");
        }
        found
    }

    /// 解析路径并读取图片尺寸；任一步失败都返回 `None`。
    pub fn locate_background(&self, path_str: &str) -> Option<Background> {
        let path = self.resolve(path_str)?;
        match probe_background(&path) {
            Ok(background) => Some(background),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "背景图片无法读取");
                None
            }
        }
    }

    fn canonicalize_or_clone(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tagscene_config::ResourceConfig;

    use super::*;

    #[test]
    fn relative_paths_prefer_base_dir() {
        let base = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        fs::write(base.path().join("scan.png"), b"x").unwrap();
        fs::write(extra.path().join("other.png"), b"x").unwrap();

        let config = AppConfig {
            resources: ResourceConfig {
                image_roots: vec![extra.path().to_path_buf(), base.path().join("missing")],
            },
            ..AppConfig::default()
        };
        let locator = ImageLocator::from_config(Some(base.path()), &config);
        assert_eq!(locator.search_roots().len(), 2);

        let found = locator.resolve("scan.png").unwrap();
        assert!(found.ends_with("scan.png"));
        assert!(locator.resolve("other.png").is_some());
        assert!(locator.resolve("nothing.png").is_none());
    }

    #[test]
    fn relative_paths_fall_back_to_working_directory() {
        let file = tempfile::Builder::new()
            .prefix("locator-cwd-")
            .suffix(".png")
            .tempfile_in(".")
            .unwrap();
        let name = file.path().file_name().unwrap().to_str().unwrap().to_string();
        image::RgbImage::new(32, 16).save(file.path()).unwrap();

        let base = tempfile::tempdir().unwrap();
        let locator = ImageLocator::from_config(Some(base.path()), &AppConfig::default());
        assert!(locator.resolve(&name).is_some());
        match locator.locate_background(&name) {
            Some(Background::Image { width, height, .. }) => {
                assert_eq!((width, height), (32, 16));
            }
            other => panic!("unexpected background {other:?}"),
        }

        let no_roots = ImageLocator::from_config(None, &AppConfig::default());
        assert!(no_roots.resolve(&name).is_some());
    }

    #[test]
    fn unreadable_image_yields_no_background() {
        let base = tempfile::tempdir().unwrap();
        fs::write(base.path().join("fake.png"), b"not an image").unwrap();
        let locator = ImageLocator::from_config(Some(base.path()), &AppConfig::default());
        assert!(locator.resolve("fake.png").is_some());
        assert!(locator.locate_background("fake.png").is_none());

        let real = base.path().join("real.png");
        image::RgbImage::new(8, 6).save(&real).unwrap();
        match locator.locate_background("real.png") {
            Some(Background::Image { width, height, .. }) => {
                assert_eq!((width, height), (8, 6));
            }
            other => panic!("unexpected background {other:?}"),
        }
    }
}
