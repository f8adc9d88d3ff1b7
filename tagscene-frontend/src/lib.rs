pub mod cli;
pub mod errors;
pub mod loader;
pub mod resource_locator;
pub mod session;

use std::io::Write;
use std::path::Path;

use errors::FrontendError;
use tagscene_config::AppConfig;
use tracing::info;

use cli::{ScriptReport, ScriptRunner, print_scene, read_script};
use session::Session;

/// 一次脚本运行的输入。
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptJob<'a> {
    pub project: Option<&'a Path>,
    pub script: Option<&'a Path>,
    pub save_to: Option<&'a Path>,
    pub keep_going: bool,
}

/// 打开项目（可选）、执行脚本（可选）、保存（可选），最后打印场景概览。
pub fn run_script_job<W: Write>(
    config: AppConfig,
    job: ScriptJob<'_>,
    out: &mut W,
) -> Result<ScriptReport, FrontendError> {
    let mut session = Session::new(config);
    if let Some(project) = job.project {
        session.open(project)?;
    }

    let runner = ScriptRunner::new(job.keep_going);
    let report = match job.script {
        Some(path) => {
            info!(script = %path.display(), "执行脚本");
            let script = read_script(path)?;
            runner.run(&mut session, &script, out)?
        }
        None => ScriptReport::default(),
    };

    if let Some(target) = job.save_to {
        session.save_to(target)?;
        info!(path = %target.display(), "场景已写出");
    }

    print_scene(&session, out)?;
    Ok(report)
}
