//! 脚本前端：逐行把文本意图交给命令总线，文件类意图由会话处理。

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tagscene_core::document::Entity;
use tagscene_engine::command::{CommandBus, CommandContext, CommandRequest, CommandResponse};
use tracing::{debug, info, warn};

use crate::errors::FrontendError;
use crate::session::{Dialogs, FileKind, Session};

/// 脚本模式下的对话框：路径来自命令参数，消息写入日志。
#[derive(Debug, Default)]
pub struct ScriptDialogs {
    queued: VecDeque<PathBuf>,
    messages: Vec<(String, String)>,
}

impl ScriptDialogs {
    pub fn queue(&mut self, path: impl Into<PathBuf>) {
        self.queued.push_back(path.into());
    }

    pub fn messages(&self) -> &[(String, String)] {
        &self.messages
    }
}

impl Dialogs for ScriptDialogs {
    fn pick_open(&mut self, kind: FileKind) -> Option<PathBuf> {
        let picked = self.queued.pop_front();
        debug!(?kind, ?picked, "打开文件");
        picked
    }

    fn pick_save(&mut self, kind: FileKind) -> Option<PathBuf> {
        let picked = self.queued.pop_front();
        debug!(?kind, ?picked, "保存文件");
        picked
    }

    fn message(&mut self, title: &str, text: &str) {
        info!(title, text, "提示");
        self.messages.push((title.to_string(), text.to_string()));
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScriptReport {
    pub executed: usize,
    pub failures: Vec<(usize, String)>,
}

pub struct ScriptRunner {
    bus: CommandBus,
    keep_going: bool,
}

impl ScriptRunner {
    /// `keep_going` 为 `false` 时遇到第一条失败的命令即停止。
    pub fn new(keep_going: bool) -> Self {
        Self {
            bus: CommandBus::new(),
            keep_going,
        }
    }

    pub fn run<W: Write>(
        &self,
        session: &mut Session,
        script: &str,
        out: &mut W,
    ) -> Result<ScriptReport, FrontendError> {
        let mut dialogs = ScriptDialogs::default();
        let mut report = ScriptReport::default();

        for (index, line) in script.lines().enumerate() {
            let line_no = index + 1;
            let Some(request) = CommandRequest::parse(line) else {
                continue;
            };
            let response = self.execute(session, &request, &mut dialogs);
            report.executed += 1;
            let message = response.message.unwrap_or_default();
            if response.success {
                writeln!(out, "[{line_no}] {} => {message}", line.trim())
                    .map_err(FrontendError::Output)?;
                continue;
            }

            writeln!(out, "[{line_no}] {} !! {message}", line.trim())
                .map_err(FrontendError::Output)?;
            warn!(line = line_no, command = %request.name, error = %message, "脚本命令失败");
            if !self.keep_going {
                return Err(FrontendError::Script {
                    line: line_no,
                    message,
                });
            }
            report.failures.push((line_no, message));
        }

        info!(
            executed = report.executed,
            failed = report.failures.len(),
            "脚本执行完毕"
        );
        Ok(report)
    }

    /// 执行单条意图。文件类意图交给会话，其余交给命令总线。
    pub fn execute(
        &self,
        session: &mut Session,
        request: &CommandRequest,
        dialogs: &mut ScriptDialogs,
    ) -> CommandResponse {
        let path_arg = (!request.args.is_empty()).then(|| PathBuf::from(request.args.join(" ")));
        match request.name.as_str() {
            "new" => CommandResponse::ok(session.new_project().outcome.to_string()),
            "open" => {
                let Some(path) = path_arg else {
                    return CommandResponse::err("missing argument <path>");
                };
                dialogs.queue(path);
                match session.open_with(dialogs) {
                    Ok(Some(feedback)) => CommandResponse::ok(feedback.outcome.to_string()),
                    Ok(None) => CommandResponse::err("open cancelled"),
                    Err(err) => CommandResponse::err(err.to_string()),
                }
            }
            "save" | "save_as" => {
                if let Some(path) = path_arg {
                    dialogs.queue(path);
                }
                let saved = if request.name == "save" {
                    session.save(dialogs)
                } else {
                    session.save_as(dialogs)
                };
                match saved {
                    Ok(Some(path)) => CommandResponse::ok(format!("saved {}", path.display())),
                    Ok(None) => CommandResponse::err("save cancelled"),
                    Err(err) => CommandResponse::err(err.to_string()),
                }
            }
            "image" => {
                let Some(path) = path_arg else {
                    return CommandResponse::err("missing argument <path>");
                };
                dialogs.queue(path);
                match session.import_image_with(dialogs) {
                    Ok(Some(feedback)) => CommandResponse::ok(feedback.outcome.to_string()),
                    Ok(None) => CommandResponse::err("import cancelled"),
                    Err(err) => CommandResponse::err(err.to_string()),
                }
            }
            _ => {
                let mut context = CommandContext {
                    editor: session.editor_mut(),
                };
                self.bus.dispatch(request, &mut context)
            }
        }
    }

    pub fn available_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.bus.available_commands().copied().collect();
        names.extend(["open", "save", "save_as", "image"]);
        names.sort_unstable();
        names.dedup();
        names
    }
}

pub fn read_script(path: &Path) -> Result<String, FrontendError> {
    fs::read_to_string(path).map_err(|source| FrontendError::ScriptRead {
        path: path.to_path_buf(),
        source,
    })
}

/// 打印场景概览：状态行与全部实体。
pub fn print_scene<W: Write>(session: &Session, out: &mut W) -> Result<(), FrontendError> {
    let editor = session.editor();
    let status = editor.status();
    let document = editor.document();
    let bounds = document.scene_bounds();

    let mut lines = vec![
        format!(
            "模式={} 活动圆={} 实体数={} 选中数={}",
            status.mode,
            status.active_circle.as_deref().unwrap_or("-"),
            status.entity_count,
            status.selection_len
        ),
        format!(
            "撤销={} 重做={}",
            status.undo_text.as_deref().unwrap_or("-"),
            status.redo_text.as_deref().unwrap_or("-")
        ),
        match &status.background {
            Some(path) => format!(
                "背景={} ({:.0}x{:.0})",
                path.display(),
                bounds.width(),
                bounds.height()
            ),
            None => format!("背景=默认画布 ({:.0}x{:.0})", bounds.width(), bounds.height()),
        },
    ];
    if let Some(path) = session.current_path() {
        lines.push(format!("项目文件={}", path.display()));
    }

    lines.push("当前场景实体：".to_string());
    for (id, entity) in document.entities() {
        let position = entity.position();
        let marker = if editor.is_selected(id) { " [选中]" } else { "" };
        let line = match entity {
            Entity::Circle(circle) => format!(
                "  - 圆 {}, ID={}, 圆心=({:.2}, {:.2}){}{}",
                id,
                circle.id,
                position.x(),
                position.y(),
                if circle.highlighted { " [活动]" } else { "" },
                marker
            ),
            Entity::Label(label) | Entity::Label2(label) => format!(
                "  - {} {}, ID={}, 位置=({:.2}, {:.2}){}",
                entity.kind(),
                id,
                label.id,
                position.x(),
                position.y(),
                marker
            ),
            Entity::Rectangle(rect) => format!(
                "  - 矩形 {}, 标题={}, 位置=({:.2}, {:.2}), 尺寸={:.2}x{:.2}{}",
                id,
                rect.compound_key(),
                position.x(),
                position.y(),
                rect.width,
                rect.height,
                marker
            ),
        };
        lines.push(line);
    }

    for line in lines {
        writeln!(out, "{line}").map_err(FrontendError::Output)?;
    }
    Ok(())
}
