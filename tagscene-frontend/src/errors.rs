use std::path::PathBuf;

use thiserror::Error;

use tagscene_config::ConfigError;
use tagscene_engine::errors::EngineError;
use tagscene_io::IoError;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("无法加载背景图片 {0:?}")]
    ImageUnavailable(PathBuf),
    #[error("读取脚本 {path:?} 失败: {source}")]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("脚本第 {line} 行执行失败: {message}")]
    Script { line: usize, message: String },
    #[error("写出结果失败: {0}")]
    Output(#[source] std::io::Error),
}
