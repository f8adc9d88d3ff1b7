pub mod arrange;
pub mod command;
pub mod history;

pub mod errors {
    use thiserror::Error;

    use crate::scene::ModeKind;

    /// 校验类错误：状态保持不变，也不会产生命令。
    #[derive(Debug, Error, Clone, PartialEq, Eq)]
    pub enum EngineError {
        #[error("circle id must not be empty")]
        EmptyCircleId,
        #[error("circle {0:?} already exists")]
        DuplicateCircle(String),
        #[error("no circle selected")]
        NoActiveCircle,
        #[error("label sequence must be a positive integer, got {0}")]
        InvalidSequence(u32),
        #[error("label {0:?} already exists")]
        DuplicateLabel(String),
        #[error("rectangle id must be a positive integer, got {0:?}")]
        InvalidRectangleId(String),
        #[error("rectangle text is required")]
        EmptyRectangleText,
        #[error("rectangle {0:?} already exists")]
        DuplicateRectangle(String),
        #[error("nothing to place in {0} mode")]
        NotPlacing(ModeKind),
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
    }
}

pub mod scene {
    use std::collections::BTreeSet;
    use std::fmt;
    use std::path::PathBuf;

    use tagscene_core::document::{
        Background, Circle, Document, Entity, EntityId, EntityMetrics, Label, Rectangle,
        primary_label_id, secondary_label_id,
    };
    use tagscene_core::geometry::{Bounds2D, Point2, Vector2};
    use tracing::debug;

    use crate::arrange::{self, AlignEdge, Axis, Direction, Placement};
    use crate::errors::EngineError;
    use crate::history::{Command, CommandLog, DEFAULT_UNDO_LIMIT, MoveRecord};

    /// 编辑器可调参数，通常由配置文件提供。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct EditorSettings {
        pub undo_limit: usize,
        pub nudge_step: f64,
        pub fine_nudge_step: f64,
        pub min_rectangle_size: f64,
        pub distribute_tolerance: f64,
        pub canvas_width: f64,
        pub canvas_height: f64,
        pub metrics: EntityMetrics,
    }

    impl Default for EditorSettings {
        fn default() -> Self {
            Self {
                undo_limit: DEFAULT_UNDO_LIMIT,
                nudge_step: 10.0,
                fine_nudge_step: 1.0,
                min_rectangle_size: 1.0,
                distribute_tolerance: 0.1,
                canvas_width: 1000.0,
                canvas_height: 800.0,
                metrics: EntityMetrics::default(),
            }
        }
    }

    /// 正在绘制、尚未提交的矩形。不属于文档，也不进入历史。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct RectanglePreview {
        pub anchor: Point2,
        pub bounds: Bounds2D,
    }

    impl RectanglePreview {
        fn new(anchor: Point2) -> Self {
            Self {
                anchor,
                bounds: Bounds2D::from_corners(anchor, anchor),
            }
        }

        fn stretch_to(&mut self, point: Point2) {
            self.bounds = Bounds2D::from_corners(self.anchor, point);
        }
    }

    /// 交互模式。待放置的 id、矩形子编号与预览都保存在对应变体里。
    #[derive(Debug, Clone, PartialEq)]
    pub enum Mode {
        Select,
        AddCircle {
            id: String,
        },
        AddLabel {
            id: String,
        },
        AddLabel2 {
            id: String,
        },
        DrawingRectangle {
            sub_id: u32,
            text: String,
            preview: Option<RectanglePreview>,
        },
    }

    impl Mode {
        pub fn kind(&self) -> ModeKind {
            match self {
                Mode::Select => ModeKind::Select,
                Mode::AddCircle { .. } => ModeKind::AddCircle,
                Mode::AddLabel { .. } => ModeKind::AddLabel,
                Mode::AddLabel2 { .. } => ModeKind::AddLabel2,
                Mode::DrawingRectangle { .. } => ModeKind::DrawingRectangle,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ModeKind {
        Select,
        AddCircle,
        AddLabel,
        AddLabel2,
        DrawingRectangle,
    }

    impl fmt::Display for ModeKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let name = match self {
                ModeKind::Select => "select",
                ModeKind::AddCircle => "add-circle",
                ModeKind::AddLabel => "add-label",
                ModeKind::AddLabel2 => "add-label2",
                ModeKind::DrawingRectangle => "draw-rectangle",
            };
            f.write_str(name)
        }
    }

    /// 一次操作的结果。
    #[derive(Debug, Clone, PartialEq)]
    pub enum Outcome {
        Unchanged,
        ModeEntered(ModeKind),
        Created(EntityId),
        /// 矩形过小被丢弃。
        Discarded,
        Preview(Bounds2D),
        Moved(usize),
        Removed(usize),
        SelectionChanged(usize),
        ActiveCircle(Option<String>),
        BackgroundChanged,
        Undone(String),
        Redone(String),
        Cancelled,
        Reset,
    }

    impl fmt::Display for Outcome {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Outcome::Unchanged => write!(f, "nothing changed"),
                Outcome::ModeEntered(mode) => write!(f, "entered {mode} mode"),
                Outcome::Created(id) => write!(f, "created entity {id}"),
                Outcome::Discarded => write!(f, "rectangle too small, discarded"),
                Outcome::Preview(bounds) => write!(
                    f,
                    "preview {:.1}x{:.1} at ({:.1}, {:.1})",
                    bounds.width(),
                    bounds.height(),
                    bounds.left(),
                    bounds.top()
                ),
                Outcome::Moved(count) => write!(f, "moved {count} item(s)"),
                Outcome::Removed(count) => write!(f, "removed {count} item(s)"),
                Outcome::SelectionChanged(count) => write!(f, "{count} item(s) selected"),
                Outcome::ActiveCircle(Some(id)) => write!(f, "active circle is {id}"),
                Outcome::ActiveCircle(None) => write!(f, "no active circle"),
                Outcome::BackgroundChanged => write!(f, "background changed"),
                Outcome::Undone(text) => write!(f, "undid {text}"),
                Outcome::Redone(text) => write!(f, "redid {text}"),
                Outcome::Cancelled => write!(f, "cancelled"),
                Outcome::Reset => write!(f, "scene reset"),
            }
        }
    }

    /// 返回给界面层的反馈：结果、当前模式与活动圆。
    #[derive(Debug, Clone, PartialEq)]
    pub struct Feedback {
        pub outcome: Outcome,
        pub mode: ModeKind,
        pub active_circle: Option<String>,
    }

    impl Feedback {
        #[inline]
        pub fn changed(&self) -> bool {
            self.outcome != Outcome::Unchanged
        }
    }

    pub type EditResult = Result<Feedback, EngineError>;

    /// 界面刷新所需的状态快照。
    #[derive(Debug, Clone, PartialEq)]
    pub struct EditorStatus {
        pub mode: ModeKind,
        pub active_circle: Option<String>,
        pub entity_count: usize,
        pub selection_len: usize,
        pub can_undo: bool,
        pub can_redo: bool,
        pub undo_text: Option<String>,
        pub redo_text: Option<String>,
        pub background: Option<PathBuf>,
    }

    #[derive(Debug, Clone)]
    enum DragState {
        Idle,
        /// 拖动选中实体：记录按下点与每个实体的起始位置。
        Moving {
            anchor: Point2,
            starts: Vec<(EntityId, Point2)>,
        },
        /// 在空白处按下：橡皮筋框选。
        RubberBand {
            anchor: Point2,
        },
    }

    /// 标注场景的编辑状态机。持有文档、历史栈、选中集、活动圆与当前模式。
    #[derive(Debug)]
    pub struct Editor {
        document: Document,
        history: CommandLog,
        selected: BTreeSet<EntityId>,
        active_circle: Option<String>,
        mode: Mode,
        drag: DragState,
        settings: EditorSettings,
    }

    impl Editor {
        pub fn new() -> Self {
            Self::with_settings(EditorSettings::default())
        }

        pub fn with_settings(settings: EditorSettings) -> Self {
            Self {
                document: Document::with_canvas(
                    settings.canvas_width,
                    settings.canvas_height,
                    settings.metrics,
                ),
                history: CommandLog::new(settings.undo_limit),
                selected: BTreeSet::new(),
                active_circle: None,
                mode: Mode::Select,
                drag: DragState::Idle,
                settings,
            }
        }

        #[inline]
        pub fn document(&self) -> &Document {
            &self.document
        }

        #[inline]
        pub fn history(&self) -> &CommandLog {
            &self.history
        }

        #[inline]
        pub fn settings(&self) -> &EditorSettings {
            &self.settings
        }

        #[inline]
        pub fn mode(&self) -> &Mode {
            &self.mode
        }

        #[inline]
        pub fn active_circle(&self) -> Option<&str> {
            self.active_circle.as_deref()
        }

        pub fn preview(&self) -> Option<RectanglePreview> {
            match &self.mode {
                Mode::DrawingRectangle { preview, .. } => *preview,
                _ => None,
            }
        }

        pub fn status(&self) -> EditorStatus {
            EditorStatus {
                mode: self.mode.kind(),
                active_circle: self.active_circle.clone(),
                entity_count: self.document.entity_count(),
                selection_len: self.selected.len(),
                can_undo: self.history.can_undo(),
                can_redo: self.history.can_redo(),
                undo_text: self.history.undo_text().map(str::to_string),
                redo_text: self.history.redo_text().map(str::to_string),
                background: self.document.background().path().map(|p| p.to_path_buf()),
            }
        }

        // ---- 选中集 ----

        #[inline]
        pub fn selection_len(&self) -> usize {
            self.selected.len()
        }

        #[inline]
        pub fn is_selected(&self, id: EntityId) -> bool {
            self.selected.contains(&id)
        }

        /// 以迭代形式返回当前选中实体 ID（按层叠顺序）。
        #[inline]
        pub fn selection(&self) -> impl Iterator<Item = EntityId> + '_ {
            self.selected.iter().copied()
        }

        /// 选中指定实体。若实体不存在则返回错误。
        pub fn select(&mut self, id: EntityId) -> Result<(), EngineError> {
            if !self.document.contains(id) {
                return Err(EngineError::EntityNotFound(id.get()));
            }
            self.selected.insert(id);
            Ok(())
        }

        /// 取消选中，返回之前是否处于选中状态。
        pub fn deselect(&mut self, id: EntityId) -> bool {
            self.selected.remove(&id)
        }

        /// 切换选中状态，返回切换后的状态。
        pub fn toggle_selection(&mut self, id: EntityId) -> Result<bool, EngineError> {
            if !self.document.contains(id) {
                return Err(EngineError::EntityNotFound(id.get()));
            }
            if self.selected.insert(id) {
                Ok(true)
            } else {
                self.selected.remove(&id);
                Ok(false)
            }
        }

        #[inline]
        pub fn clear_selection(&mut self) {
            self.selected.clear();
        }

        pub fn select_all(&mut self) {
            self.selected = self.document.entities().map(|(id, _)| id).collect();
        }

        /// 以当前选中数量作为结果的反馈。
        pub fn selection_feedback(&self) -> Feedback {
            self.feedback(Outcome::SelectionChanged(self.selected.len()))
        }

        /// 选中实体的合并包围盒。
        pub fn selection_bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for id in &self.selected {
                if let Some(entity_bounds) = self.document.entity_bounds(*id) {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        // ---- 项目生命周期 ----

        /// 新建空白项目：清空实体、背景、历史与运行时状态。
        pub fn new_project(&mut self) -> Feedback {
            let blank = self.document.empty_like();
            self.load_document(blank)
        }

        /// 整体替换文档。历史被清空，活动圆与选中集复位。
        pub fn load_document(&mut self, document: Document) -> Feedback {
            self.document = document;
            self.history.clear();
            self.selected.clear();
            self.active_circle = None;
            self.mode = Mode::Select;
            self.drag = DragState::Idle;
            self.refresh_highlights();
            debug!(
                entities = self.document.entity_count(),
                background = ?self.document.background().path(),
                "场景已替换"
            );
            self.feedback(Outcome::Reset)
        }

        // ---- 进入添加模式 ----

        pub fn begin_add_circle(&mut self, id: &str) -> EditResult {
            let id = id.trim();
            if id.is_empty() {
                return self.reject(EngineError::EmptyCircleId);
            }
            if self.document.registry().circle_exists(id) {
                return self.reject(EngineError::DuplicateCircle(id.to_string()));
            }
            Ok(self.enter(Mode::AddCircle { id: id.to_string() }))
        }

        /// 进入添加 Label 模式。`sequence` 缺省时取下一个可用序号。
        pub fn begin_add_label(&mut self, sequence: Option<u32>) -> EditResult {
            let circle_id = self.require_active_circle()?;
            let sequence = sequence
                .unwrap_or_else(|| self.document.registry().next_label_sequence(Some(&circle_id)));
            if sequence == 0 {
                return self.reject(EngineError::InvalidSequence(sequence));
            }
            let id = primary_label_id(&circle_id, sequence);
            if self.document.registry().label_exists(&id) {
                return self.reject(EngineError::DuplicateLabel(id));
            }
            Ok(self.enter(Mode::AddLabel { id }))
        }

        pub fn begin_add_label2(&mut self, sequence: Option<u32>) -> EditResult {
            let circle_id = self.require_active_circle()?;
            let sequence = sequence.unwrap_or_else(|| {
                self.document
                    .registry()
                    .next_label2_sequence(Some(&circle_id))
            });
            if sequence == 0 {
                return self.reject(EngineError::InvalidSequence(sequence));
            }
            let id = secondary_label_id(&circle_id, sequence);
            if self.document.registry().label2_exists(&id) {
                return self.reject(EngineError::DuplicateLabel(id));
            }
            Ok(self.enter(Mode::AddLabel2 { id }))
        }

        /// 进入矩形绘制模式。`sub_id` 为用户输入的文本，必须是正整数。
        pub fn begin_draw_rectangle(&mut self, sub_id: &str, text: &str) -> EditResult {
            let circle_id = self.require_active_circle()?;
            let raw = sub_id.trim();
            let parsed = raw
                .chars()
                .all(|c| c.is_ascii_digit())
                .then(|| raw.parse::<u32>().ok())
                .flatten()
                .filter(|value| *value > 0);
            let Some(sub_id) = parsed else {
                return self.reject(EngineError::InvalidRectangleId(raw.to_string()));
            };
            let text = text.trim();
            if text.is_empty() {
                return self.reject(EngineError::EmptyRectangleText);
            }
            if self
                .document
                .registry()
                .rectangle_compound_exists(&circle_id, sub_id, text)
            {
                return self.reject(EngineError::DuplicateRectangle(format!(
                    "{circle_id}.{sub_id}.{text}"
                )));
            }
            Ok(self.enter(Mode::DrawingRectangle {
                sub_id,
                text: text.to_string(),
                preview: None,
            }))
        }

        // ---- 指针输入 ----

        /// 在添加模式下于指定位置放置实体，并回到选择模式。
        pub fn place_at(&mut self, position: Point2) -> EditResult {
            let mode = std::mem::replace(&mut self.mode, Mode::Select);
            let entity = match mode {
                Mode::AddCircle { id } => {
                    if self.document.registry().circle_exists(&id) {
                        return self.reject(EngineError::DuplicateCircle(id));
                    }
                    Entity::Circle(Circle::new(id, position))
                }
                Mode::AddLabel { id } => {
                    if self.document.registry().label_exists(&id) {
                        return self.reject(EngineError::DuplicateLabel(id));
                    }
                    Entity::Label(Label::with_id(id, position))
                }
                Mode::AddLabel2 { id } => {
                    if self.document.registry().label2_exists(&id) {
                        return self.reject(EngineError::DuplicateLabel(id));
                    }
                    Entity::Label2(Label::with_id(id, position))
                }
                other => {
                    let kind = other.kind();
                    self.mode = other;
                    return self.reject(EngineError::NotPlacing(kind));
                }
            };

            let description = format!("Add {}", entity.kind().describe());
            let new_active = entity.as_circle().map(|circle| circle.id.clone());
            let id = self.document.allocate_id();
            self.push(Command::add(description, vec![(id, entity)]));
            if new_active.is_some() {
                self.active_circle = new_active;
                self.refresh_highlights();
            }
            Ok(self.feedback(Outcome::Created(id)))
        }

        /// 单击。选择模式下：命中圆则设为活动圆，并按默认规则更新选中集。
        pub fn click(&mut self, position: Point2) -> EditResult {
            match self.mode {
                Mode::Select => {}
                Mode::DrawingRectangle { .. } => return Ok(self.feedback(Outcome::Unchanged)),
                _ => return self.place_at(position),
            }
            self.abort_drag();
            let hits = self.document.entities_at(position);
            self.selected.clear();
            if let Some(top) = hits.first() {
                self.selected.insert(*top);
            }
            let outcome = self
                .activate_circle_under(&hits)
                .unwrap_or(Outcome::SelectionChanged(self.selected.len()));
            Ok(self.feedback(outcome))
        }

        /// 按下并开始拖动。
        pub fn drag_start(&mut self, position: Point2) -> EditResult {
            match &mut self.mode {
                Mode::Select => {}
                Mode::DrawingRectangle { preview, .. } => {
                    let started = RectanglePreview::new(position);
                    *preview = Some(started);
                    return Ok(self.feedback(Outcome::Preview(started.bounds)));
                }
                _ => return self.place_at(position),
            }

            self.abort_drag();
            let hits = self.document.entities_at(position);
            let outcome = match hits.first().copied() {
                Some(top) => {
                    if !self.selected.contains(&top) {
                        self.selected.clear();
                        self.selected.insert(top);
                    }
                    let starts = self
                        .selected
                        .iter()
                        .filter_map(|id| self.document.position(*id).map(|p| (*id, p)))
                        .collect();
                    self.drag = DragState::Moving {
                        anchor: position,
                        starts,
                    };
                    self.activate_circle_under(&hits)
                        .unwrap_or(Outcome::SelectionChanged(self.selected.len()))
                }
                None => {
                    self.selected.clear();
                    self.drag = DragState::RubberBand { anchor: position };
                    Outcome::SelectionChanged(0)
                }
            };
            Ok(self.feedback(outcome))
        }

        /// 拖动中。实体位置实时跟随，但在松开前不会产生命令。
        pub fn drag_update(&mut self, position: Point2) -> EditResult {
            if let Mode::DrawingRectangle {
                preview: Some(preview),
                ..
            } = &mut self.mode
            {
                preview.stretch_to(position);
                let bounds = preview.bounds;
                return Ok(self.feedback(Outcome::Preview(bounds)));
            }

            let outcome = match &self.drag {
                DragState::Idle => Outcome::Unchanged,
                DragState::Moving { anchor, starts } => {
                    let offset = Vector2::from_points(*anchor, position);
                    for (id, start) in starts {
                        self.document.set_position(*id, start.translate(offset));
                    }
                    Outcome::Moved(starts.len())
                }
                DragState::RubberBand { anchor } => {
                    let area = Bounds2D::from_corners(*anchor, position);
                    self.selected = self
                        .document
                        .entities_intersecting(&area)
                        .into_iter()
                        .collect();
                    Outcome::SelectionChanged(self.selected.len())
                }
            };
            Ok(self.feedback(outcome))
        }

        /// 松开。矩形模式下提交矩形；拖动实体时生成一条移动命令。
        pub fn drag_end(&mut self, position: Point2) -> EditResult {
            match std::mem::replace(&mut self.mode, Mode::Select) {
                Mode::DrawingRectangle {
                    sub_id,
                    text,
                    preview,
                } => return self.finish_rectangle(sub_id, text, preview, position),
                other => self.mode = other,
            }

            self.drag_update(position)?;
            let outcome = match std::mem::replace(&mut self.drag, DragState::Idle) {
                DragState::Moving { starts, .. } => {
                    let moves: Vec<MoveRecord> = starts
                        .into_iter()
                        .filter_map(|(id, from)| {
                            let to = self.document.position(id)?;
                            (to != from).then_some(MoveRecord { id, from, to })
                        })
                        .collect();
                    if moves.is_empty() {
                        Outcome::Unchanged
                    } else {
                        // 先复位，再由命令的 redo 落到终点
                        for record in &moves {
                            self.document.set_position(record.id, record.from);
                        }
                        let count = moves.len();
                        self.push(Command::move_items("Mouse Drag", moves));
                        Outcome::Moved(count)
                    }
                }
                DragState::RubberBand { .. } => Outcome::SelectionChanged(self.selected.len()),
                DragState::Idle => Outcome::Unchanged,
            };
            Ok(self.feedback(outcome))
        }

        fn finish_rectangle(
            &mut self,
            sub_id: u32,
            text: String,
            preview: Option<RectanglePreview>,
            position: Point2,
        ) -> EditResult {
            let Some(mut preview) = preview else {
                return Ok(self.feedback(Outcome::ModeEntered(ModeKind::Select)));
            };
            preview.stretch_to(position);
            let bounds = preview.bounds;
            let min = self.settings.min_rectangle_size;
            if bounds.width() <= min || bounds.height() <= min {
                debug!(
                    width = bounds.width(),
                    height = bounds.height(),
                    "矩形尺寸过小，已丢弃"
                );
                return Ok(self.feedback(Outcome::Discarded));
            }
            let Some(circle_id) = self.active_circle.clone() else {
                return self.reject(EngineError::NoActiveCircle);
            };
            if self
                .document
                .registry()
                .rectangle_compound_exists(&circle_id, sub_id, &text)
            {
                return self.reject(EngineError::DuplicateRectangle(format!(
                    "{circle_id}.{sub_id}.{text}"
                )));
            }
            let rectangle = Rectangle::new(
                circle_id,
                sub_id,
                text,
                bounds.min(),
                bounds.width(),
                bounds.height(),
            );
            let id = self.document.allocate_id();
            self.push(Command::add(
                "Add Rectangle",
                vec![(id, Entity::Rectangle(rectangle))],
            ));
            Ok(self.feedback(Outcome::Created(id)))
        }

        // ---- 键盘类操作 ----

        /// 把选中实体整体平移，作为一条命令入栈。
        pub fn nudge(&mut self, dx: f64, dy: f64) -> EditResult {
            let offset = Vector2::new(dx, dy);
            if self.selected.is_empty() || offset.is_zero() {
                return Ok(self.feedback(Outcome::Unchanged));
            }
            self.abort_drag();
            let moves: Vec<MoveRecord> = self
                .selected
                .iter()
                .filter_map(|id| {
                    let from = self.document.position(*id)?;
                    Some(MoveRecord {
                        id: *id,
                        from,
                        to: from.translate(offset),
                    })
                })
                .collect();
            let count = moves.len();
            self.push(Command::move_items("Arrow Move", moves));
            Ok(self.feedback(Outcome::Moved(count)))
        }

        /// 方向键微移：默认步长或精细步长。
        pub fn nudge_direction(&mut self, direction: Direction, fine: bool) -> EditResult {
            let step = if fine {
                self.settings.fine_nudge_step
            } else {
                self.settings.nudge_step
            };
            let offset = direction.offset(step);
            self.nudge(offset.x(), offset.y())
        }

        pub fn delete_selection(&mut self) -> EditResult {
            if self.selected.is_empty() {
                return Ok(self.feedback(Outcome::Unchanged));
            }
            self.abort_drag();
            let items: Vec<(EntityId, Entity)> = self
                .selected
                .iter()
                .filter_map(|id| self.document.entity(*id).map(|e| (*id, e.clone())))
                .collect();
            let removes_active = self.active_circle.as_deref().is_some_and(|active| {
                items
                    .iter()
                    .any(|(_, entity)| matches!(entity, Entity::Circle(c) if c.id == active))
            });
            if removes_active {
                self.active_circle = None;
            }
            let count = items.len();
            self.push(Command::remove("Delete Items", items));
            Ok(self.feedback(Outcome::Removed(count)))
        }

        pub fn align(&mut self, edge: AlignEdge) -> EditResult {
            self.abort_drag();
            let moves = arrange::align(&self.selected_placements(), edge);
            self.push_moves(format!("Align {edge}"), moves)
        }

        pub fn distribute(&mut self, axis: Axis) -> EditResult {
            self.abort_drag();
            let moves = arrange::distribute(
                &self.selected_placements(),
                axis,
                self.settings.distribute_tolerance,
            );
            self.push_moves(format!("Distribute {axis}"), moves)
        }

        /// 取消：非选择模式下丢弃预览并回到选择模式；选择模式下清空选中集。
        pub fn cancel(&mut self) -> EditResult {
            if self.mode.kind() != ModeKind::Select {
                self.enter(Mode::Select);
                return Ok(self.feedback(Outcome::Cancelled));
            }
            self.abort_drag();
            self.selected.clear();
            Ok(self.feedback(Outcome::SelectionChanged(0)))
        }

        /// 替换背景（可撤销）。
        pub fn import_background(&mut self, background: Background) -> EditResult {
            self.abort_drag();
            let old = self.document.background().clone();
            self.push(Command::set_background("Import Image", background, old));
            Ok(self.feedback(Outcome::BackgroundChanged))
        }

        // ---- 撤销 / 重做 ----

        pub fn undo(&mut self) -> EditResult {
            self.abort_drag();
            let undone = self
                .history
                .undo(&mut self.document)
                .map(|command| command.description().to_string());
            let outcome = match undone {
                Some(text) => {
                    self.sync_after_history();
                    Outcome::Undone(text)
                }
                None => Outcome::Unchanged,
            };
            Ok(self.feedback(outcome))
        }

        pub fn redo(&mut self) -> EditResult {
            self.abort_drag();
            let redone = self
                .history
                .redo(&mut self.document)
                .map(|command| command.description().to_string());
            let outcome = match redone {
                Some(text) => {
                    self.sync_after_history();
                    Outcome::Redone(text)
                }
                None => Outcome::Unchanged,
            };
            Ok(self.feedback(outcome))
        }

        // ---- 内部 ----

        fn feedback(&self, outcome: Outcome) -> Feedback {
            Feedback {
                outcome,
                mode: self.mode.kind(),
                active_circle: self.active_circle.clone(),
            }
        }

        fn reject(&self, error: EngineError) -> EditResult {
            debug!(error = %error, mode = %self.mode.kind(), "操作被拒绝");
            Err(error)
        }

        fn require_active_circle(&self) -> Result<String, EngineError> {
            match &self.active_circle {
                Some(id) => Ok(id.clone()),
                None => {
                    debug!(mode = %self.mode.kind(), "没有活动圆");
                    Err(EngineError::NoActiveCircle)
                }
            }
        }

        fn enter(&mut self, mode: Mode) -> Feedback {
            self.abort_drag();
            let kind = mode.kind();
            if kind != ModeKind::Select {
                self.selected.clear();
            }
            debug!(mode = %kind, "切换编辑模式");
            self.mode = mode;
            self.feedback(Outcome::ModeEntered(kind))
        }

        fn push(&mut self, command: Command) {
            self.history.push(command, &mut self.document);
            self.sync_after_history();
        }

        fn push_moves(&mut self, description: String, moves: Vec<MoveRecord>) -> EditResult {
            if moves.is_empty() {
                return Ok(self.feedback(Outcome::Unchanged));
            }
            let count = moves.len();
            self.push(Command::move_items(description, moves));
            Ok(self.feedback(Outcome::Moved(count)))
        }

        /// 拖动未完成时把实体放回起点。
        fn abort_drag(&mut self) {
            if let DragState::Moving { starts, .. } =
                std::mem::replace(&mut self.drag, DragState::Idle)
            {
                for (id, start) in starts {
                    self.document.set_position(id, start);
                }
            }
        }

        fn selected_placements(&self) -> Vec<Placement> {
            self.selected
                .iter()
                .filter_map(|id| {
                    let entity = self.document.entity(*id)?;
                    Some(Placement {
                        id: *id,
                        position: entity.position(),
                        bounds: entity.bounds(self.document.metrics()),
                    })
                })
                .collect()
        }

        fn activate_circle_under(&mut self, hits: &[EntityId]) -> Option<Outcome> {
            let circle_id = hits.iter().find_map(|id| {
                self.document
                    .entity(*id)
                    .and_then(Entity::as_circle)
                    .map(|circle| circle.id.clone())
            })?;
            debug!(circle = %circle_id, "活动圆已切换");
            self.active_circle = Some(circle_id.clone());
            self.refresh_highlights();
            Some(Outcome::ActiveCircle(Some(circle_id)))
        }

        /// 历史变化后：剔除已不存在的选中项，活动圆不存在时清空，再刷新高亮。
        fn sync_after_history(&mut self) {
            let document = &self.document;
            self.selected.retain(|id| document.contains(*id));
            let dangling = self
                .active_circle
                .as_deref()
                .is_some_and(|id| !self.document.registry().circle_exists(id));
            if dangling {
                self.active_circle = None;
            }
            self.refresh_highlights();
        }

        fn refresh_highlights(&mut self) {
            let active = self.active_circle.clone();
            self.document.refresh_circle_highlights(active.as_deref());
        }
    }

    impl Default for Editor {
        fn default() -> Self {
            Self::new()
        }
    }

}
