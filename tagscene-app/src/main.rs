use std::path::PathBuf;

use clap::Parser;
use tagscene_config::{AppConfig, ConfigError};
use tagscene_frontend::{ScriptJob, run_script_job};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "tagscene",
    version,
    about = "Annotate a canvas with circles, labels and rectangles from an edit script"
)]
struct Cli {
    /// Configuration file (overrides TAGSCENE_CONFIG and ./config/default.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Project JSON opened before the script runs
    #[arg(long)]
    project: Option<PathBuf>,
    /// Edit script, one intent per line
    #[arg(long)]
    script: Option<PathBuf>,
    /// Write the resulting project to this path
    #[arg(long)]
    save: Option<PathBuf>,
    /// Continue after a failing script line instead of stopping
    #[arg(long)]
    keep_going: bool,
}

fn main() {
    let cli = Cli::parse();
    let config = load_configuration(cli.config.as_ref());
    init_logging(&config);
    info!("启动 tagscene");

    let job = ScriptJob {
        project: cli.project.as_deref(),
        script: cli.script.as_deref(),
        save_to: cli.save.as_deref(),
        keep_going: cli.keep_going,
    };
    let mut stdout = std::io::stdout().lock();
    match run_script_job(config, job, &mut stdout) {
        Ok(report) if report.failures.is_empty() => {}
        Ok(report) => {
            warn!(failed = report.failures.len(), "部分脚本命令失败");
            std::process::exit(2);
        }
        Err(err) => {
            error!(error = %err, "执行失败");
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn load_configuration(override_path: Option<&PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(path).unwrap_or_else(|err| {
            eprintln!("加载指定配置失败，使用默认配置: {err}");
            AppConfig::default()
        }),
        None => AppConfig::discover().unwrap_or_else(|err| {
            match &err {
                ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                    eprintln!("加载配置 {} 失败，使用内建默认值: {err}", path.display());
                }
                ConfigError::Invalid(_) | ConfigError::Context { .. } => {
                    eprintln!("加载配置失败，使用内建默认值: {err}");
                }
            }
            AppConfig::default()
        }),
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
