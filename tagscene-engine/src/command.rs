use std::collections::HashMap;

use tagscene_core::document::EntityId;
use tagscene_core::geometry::Point2;
use thiserror::Error;

use crate::arrange::{AlignEdge, Axis, Direction, ParseArrangeError};
use crate::errors::EngineError;
use crate::scene::{Editor, Feedback};

/// 文本形式的编辑意图，例如 `rect 2 door frame`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// 解析一行脚本。空行与 `#` 开头的注释返回 `None`。
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let mut parts = line.split_whitespace();
        let name = parts.next()?.to_ascii_lowercase();
        Some(Self {
            name,
            args: parts.map(str::to_string).collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("missing argument <{0}>")]
    MissingArgument(&'static str),
    #[error("invalid {name}: {value:?}")]
    InvalidArgument { name: &'static str, value: String },
    #[error(transparent)]
    Arrange(#[from] ParseArrangeError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub editor: &'a mut Editor,
}

type IntentFn = fn(&[String], &mut Editor) -> Result<Feedback, CommandError>;

/// 把一条文本意图映射到编辑器操作。
pub struct IntentHandler {
    name: &'static str,
    run: IntentFn,
}

impl IntentHandler {
    pub const fn new(name: &'static str, run: IntentFn) -> Self {
        Self { name, run }
    }
}

impl CommandHandler for IntentHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match (self.run)(&request.args, context.editor) {
            Ok(feedback) => CommandResponse::ok(feedback.outcome.to_string()),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        for handler in builtin_intents() {
            bus.register(handler);
        }
        bus.register(StatusCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_intents() -> Vec<IntentHandler> {
    vec![
        IntentHandler::new("circle", |args, editor| {
            let id = rest(args, 0, "id")?;
            Ok(editor.begin_add_circle(&id)?)
        }),
        IntentHandler::new("label", |args, editor| {
            Ok(editor.begin_add_label(optional_sequence(args)?)?)
        }),
        IntentHandler::new("label2", |args, editor| {
            Ok(editor.begin_add_label2(optional_sequence(args)?)?)
        }),
        IntentHandler::new("rect", |args, editor| {
            let sub_id = arg(args, 0, "sub_id")?;
            let text = rest(args, 1, "text")?;
            Ok(editor.begin_draw_rectangle(sub_id, &text)?)
        }),
        IntentHandler::new("place", |args, editor| {
            Ok(editor.place_at(point(args, 0)?)?)
        }),
        IntentHandler::new("click", |args, editor| Ok(editor.click(point(args, 0)?)?)),
        IntentHandler::new("drag_start", |args, editor| {
            Ok(editor.drag_start(point(args, 0)?)?)
        }),
        IntentHandler::new("drag_update", |args, editor| {
            Ok(editor.drag_update(point(args, 0)?)?)
        }),
        IntentHandler::new("drag_end", |args, editor| {
            Ok(editor.drag_end(point(args, 0)?)?)
        }),
        IntentHandler::new("drag", |args, editor| {
            let from = point(args, 0)?;
            let to = point(args, 2)?;
            editor.drag_start(from)?;
            editor.drag_update(to)?;
            Ok(editor.drag_end(to)?)
        }),
        IntentHandler::new("nudge", |args, editor| {
            let dx = number(args, 0, "dx")?;
            let dy = number(args, 1, "dy")?;
            Ok(editor.nudge(dx, dy)?)
        }),
        IntentHandler::new("move", |args, editor| {
            let direction: Direction = arg(args, 0, "direction")?.parse()?;
            let fine = args
                .get(1)
                .is_some_and(|flag| flag.eq_ignore_ascii_case("fine"));
            Ok(editor.nudge_direction(direction, fine)?)
        }),
        IntentHandler::new("delete", |_, editor| Ok(editor.delete_selection()?)),
        IntentHandler::new("align", |args, editor| {
            let edge: AlignEdge = arg(args, 0, "edge")?.parse()?;
            Ok(editor.align(edge)?)
        }),
        IntentHandler::new("distribute", |args, editor| {
            let axis: Axis = arg(args, 0, "axis")?.parse()?;
            Ok(editor.distribute(axis)?)
        }),
        IntentHandler::new("undo", |_, editor| Ok(editor.undo()?)),
        IntentHandler::new("redo", |_, editor| Ok(editor.redo()?)),
        IntentHandler::new("cancel", |_, editor| Ok(editor.cancel()?)),
        IntentHandler::new("clear_selection", |_, editor| {
            editor.clear_selection();
            Ok(editor.selection_feedback())
        }),
        IntentHandler::new("select", |args, editor| {
            editor.select(entity_id(args, 0)?)?;
            Ok(editor.selection_feedback())
        }),
        IntentHandler::new("deselect", |args, editor| {
            editor.deselect(entity_id(args, 0)?);
            Ok(editor.selection_feedback())
        }),
        IntentHandler::new("toggle", |args, editor| {
            editor.toggle_selection(entity_id(args, 0)?)?;
            Ok(editor.selection_feedback())
        }),
        IntentHandler::new("select_all", |_, editor| {
            editor.select_all();
            Ok(editor.selection_feedback())
        }),
        IntentHandler::new("new", |_, editor| Ok(editor.new_project())),
    ]
}

struct StatusCommand;

impl CommandHandler for StatusCommand {
    fn name(&self) -> &'static str {
        "status"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let status = context.editor.status();
        let selection = match context.editor.selection_bounds() {
            Some(bounds) => format!(
                "{:.1},{:.1} {:.1}x{:.1}",
                bounds.left(),
                bounds.top(),
                bounds.width(),
                bounds.height()
            ),
            None => "-".to_string(),
        };
        CommandResponse::ok(format!(
            "mode={} active={} items={} selected={} bounds={} undo={} redo={}",
            status.mode,
            status.active_circle.as_deref().unwrap_or("-"),
            status.entity_count,
            status.selection_len,
            selection,
            status.undo_text.as_deref().unwrap_or("-"),
            status.redo_text.as_deref().unwrap_or("-"),
        ))
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &'static str) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(String::as_str)
        .ok_or(CommandError::MissingArgument(name))
}

/// 从 `index` 起的剩余参数以空格拼接，用于可能含空格的 id 与文本。
fn rest(args: &[String], index: usize, name: &'static str) -> Result<String, CommandError> {
    match args.get(index..) {
        Some(tail) if !tail.is_empty() => Ok(tail.join(" ")),
        _ => Err(CommandError::MissingArgument(name)),
    }
}

fn number(args: &[String], index: usize, name: &'static str) -> Result<f64, CommandError> {
    let raw = arg(args, index, name)?;
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::InvalidArgument {
            name,
            value: raw.to_string(),
        })
}

fn point(args: &[String], index: usize) -> Result<Point2, CommandError> {
    Ok(Point2::new(
        number(args, index, "x")?,
        number(args, index + 1, "y")?,
    ))
}

/// 实体 id，接受 `3` 或 `#3`。
fn entity_id(args: &[String], index: usize) -> Result<EntityId, CommandError> {
    let raw = arg(args, index, "entity")?;
    raw.strip_prefix('#')
        .unwrap_or(raw)
        .parse::<u64>()
        .map(EntityId::new)
        .map_err(|_| CommandError::InvalidArgument {
            name: "entity",
            value: raw.to_string(),
        })
}

fn optional_sequence(args: &[String]) -> Result<Option<u32>, CommandError> {
    args.first()
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| CommandError::InvalidArgument {
                name: "sequence",
                value: raw.clone(),
            })
        })
        .transpose()
}
