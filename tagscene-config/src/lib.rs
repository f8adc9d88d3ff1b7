use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "TAGSCENE_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `TAGSCENE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.editor.undo_limit == 0 {
            return Err(ConfigError::Invalid("editor.undo_limit 必须大于 0".to_string()));
        }
        let positive = [
            ("editor.nudge_step", self.editor.nudge_step),
            ("editor.fine_nudge_step", self.editor.fine_nudge_step),
            ("canvas.width", self.canvas.width),
            ("canvas.height", self.canvas.height),
            ("canvas.circle_radius", self.canvas.circle_radius),
            ("canvas.label_char_width", self.canvas.label_char_width),
            ("canvas.label_line_height", self.canvas.label_line_height),
            (
                "canvas.fallback_rectangle_width",
                self.canvas.fallback_rectangle_width,
            ),
            (
                "canvas.fallback_rectangle_height",
                self.canvas.fallback_rectangle_height,
            ),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} 必须为正数，当前为 {value}")));
            }
        }
        let non_negative = [
            ("editor.min_rectangle_size", self.editor.min_rectangle_size),
            ("editor.distribute_tolerance", self.editor.distribute_tolerance),
            ("canvas.label_padding", self.canvas.label_padding),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} 必须为非负有限数，当前为 {value}"
                )));
            }
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 编辑行为参数。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub undo_limit: usize,
    pub nudge_step: f64,
    pub fine_nudge_step: f64,
    /// 宽或高不超过该值的矩形在松开鼠标时被丢弃。
    pub min_rectangle_size: f64,
    pub distribute_tolerance: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo_limit: 100,
            nudge_step: 10.0,
            fine_nudge_step: 1.0,
            min_rectangle_size: 1.0,
            distribute_tolerance: 0.1,
        }
    }
}

/// 画布与实体外形参数。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
    pub circle_radius: f64,
    pub label_char_width: f64,
    pub label_line_height: f64,
    pub label_padding: f64,
    pub fallback_rectangle_width: f64,
    pub fallback_rectangle_height: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 800.0,
            circle_radius: 25.0,
            label_char_width: 11.0,
            label_line_height: 26.0,
            label_padding: 4.0,
            fallback_rectangle_width: 100.0,
            fallback_rectangle_height: 60.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    /// 解析相对背景路径时额外搜索的目录。
    #[serde(default)]
    pub image_roots: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置无效: {0}")]
    Invalid(String),
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
