//! 撤销/重做：可逆命令与有界线性历史栈。

use std::collections::VecDeque;

use tagscene_core::document::{Background, Document, Entity, EntityId};
use tagscene_core::geometry::Point2;
use tracing::{debug, trace};

/// 历史栈默认容量。
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// 单个实体的一次移动。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRecord {
    pub id: EntityId,
    pub from: Point2,
    pub to: Point2,
}

/// 一次原子、可逆的场景修改。
///
/// `AddItems`/`RemoveItems` 以值保存实体快照；实体被移出文档时会用当时的状态刷新快照，
/// 因此重新放回时与移出前完全一致。
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddItems {
        description: String,
        items: Vec<(EntityId, Entity)>,
    },
    RemoveItems {
        description: String,
        items: Vec<(EntityId, Entity)>,
    },
    MoveItems {
        description: String,
        moves: Vec<MoveRecord>,
    },
    SetBackground {
        description: String,
        new: Background,
        old: Background,
    },
}

impl Command {
    pub fn add(description: impl Into<String>, items: Vec<(EntityId, Entity)>) -> Self {
        Command::AddItems {
            description: description.into(),
            items,
        }
    }

    pub fn remove(description: impl Into<String>, items: Vec<(EntityId, Entity)>) -> Self {
        Command::RemoveItems {
            description: description.into(),
            items,
        }
    }

    pub fn move_items(description: impl Into<String>, moves: Vec<MoveRecord>) -> Self {
        Command::MoveItems {
            description: description.into(),
            moves,
        }
    }

    pub fn set_background(description: impl Into<String>, new: Background, old: Background) -> Self {
        Command::SetBackground {
            description: description.into(),
            new,
            old,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Command::AddItems { description, .. }
            | Command::RemoveItems { description, .. }
            | Command::MoveItems { description, .. }
            | Command::SetBackground { description, .. } => description,
        }
    }

    /// 受影响的实体 id；背景切换不涉及实体。
    pub fn affected(&self) -> Vec<EntityId> {
        match self {
            Command::AddItems { items, .. } | Command::RemoveItems { items, .. } => {
                items.iter().map(|(id, _)| *id).collect()
            }
            Command::MoveItems { moves, .. } => moves.iter().map(|record| record.id).collect(),
            Command::SetBackground { .. } => Vec::new(),
        }
    }

    pub fn redo(&mut self, document: &mut Document) {
        match self {
            Command::AddItems { items, .. } => insert_all(document, items),
            Command::RemoveItems { items, .. } => take_all(document, items),
            Command::MoveItems { moves, .. } => {
                for record in moves.iter() {
                    document.set_position(record.id, record.to);
                }
            }
            Command::SetBackground { new, .. } => {
                document.set_background(new.clone());
            }
        }
    }

    pub fn undo(&mut self, document: &mut Document) {
        match self {
            Command::AddItems { items, .. } => take_all(document, items),
            Command::RemoveItems { items, .. } => insert_all(document, items),
            Command::MoveItems { moves, .. } => {
                for record in moves.iter() {
                    document.set_position(record.id, record.from);
                }
            }
            Command::SetBackground { old, .. } => {
                document.set_background(old.clone());
            }
        }
    }
}

fn insert_all(document: &mut Document, items: &[(EntityId, Entity)]) {
    for (id, entity) in items {
        if !document.contains(*id) {
            document.insert_entity(*id, entity.clone());
        }
    }
}

fn take_all(document: &mut Document, items: &mut [(EntityId, Entity)]) {
    for (id, snapshot) in items.iter_mut() {
        if let Some(current) = document.remove_entity(*id) {
            *snapshot = current;
        }
    }
}

/// 有界线性历史栈。`cursor` 之前的命令已生效，之后的是可重做的尾部。
#[derive(Debug, Clone)]
pub struct CommandLog {
    commands: VecDeque<Command>,
    cursor: usize,
    limit: usize,
}

impl CommandLog {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            commands: VecDeque::with_capacity(limit),
            cursor: 0,
            limit,
        }
    }

    /// 执行命令并入栈。会截断重做尾部，超出容量时丢弃最旧的命令。
    pub fn push(&mut self, mut command: Command, document: &mut Document) {
        command.redo(document);
        self.commands.truncate(self.cursor);
        debug!(
            command = command.description(),
            affected = command.affected().len(),
            "命令入栈"
        );
        self.commands.push_back(command);
        while self.commands.len() > self.limit {
            if let Some(evicted) = self.commands.pop_front() {
                trace!(command = evicted.description(), "历史栈已满，丢弃最旧命令");
            }
        }
        self.cursor = self.commands.len();
    }

    /// 撤销最近一条命令，返回被撤销的命令。
    pub fn undo(&mut self, document: &mut Document) -> Option<&Command> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        let command = &mut self.commands[self.cursor];
        command.undo(document);
        debug!(command = command.description(), "撤销");
        Some(&*command)
    }

    /// 重做下一条命令，返回被重做的命令。
    pub fn redo(&mut self, document: &mut Document) -> Option<&Command> {
        if self.cursor >= self.commands.len() {
            return None;
        }
        let command = &mut self.commands[self.cursor];
        command.redo(document);
        self.cursor += 1;
        debug!(command = command.description(), "重做");
        Some(&*command)
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    pub fn undo_text(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|index| self.commands.get(index))
            .map(Command::description)
    }

    pub fn redo_text(&self) -> Option<&str> {
        self.commands.get(self.cursor).map(Command::description)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use tagscene_core::document::{Circle, Label};

    use super::*;

    fn circle(id: &str, x: f64, y: f64) -> Entity {
        Entity::Circle(Circle::new(id, Point2::new(x, y)))
    }

    fn snapshot(document: &Document) -> Vec<(EntityId, Entity)> {
        document
            .entities()
            .map(|(id, entity)| (id, entity.clone()))
            .collect()
    }

    #[test]
    fn add_remove_move_round_trip() {
        let mut doc = Document::new();
        let mut log = CommandLog::default();

        let a = doc.allocate_id();
        let b = doc.allocate_id();
        log.push(
            Command::add("Add Circle", vec![(a, circle("A", 10.0, 10.0))]),
            &mut doc,
        );
        log.push(
            Command::add(
                "Add Label",
                vec![(b, Entity::Label(Label::primary("A", 1, Point2::new(5.0, 5.0))))],
            ),
            &mut doc,
        );
        log.push(
            Command::move_items(
                "Arrow Move",
                vec![MoveRecord {
                    id: a,
                    from: Point2::new(10.0, 10.0),
                    to: Point2::new(20.0, 10.0),
                }],
            ),
            &mut doc,
        );
        let removed = vec![(b, doc.entity(b).cloned().expect("label"))];
        log.push(Command::remove("Delete Items", removed), &mut doc);

        let final_state = snapshot(&doc);
        assert_eq!(doc.entity_count(), 1);
        assert_eq!(doc.position(a), Some(Point2::new(20.0, 10.0)));

        while log.undo(&mut doc).is_some() {}
        assert!(doc.is_empty());
        assert!(!log.can_undo());

        while log.redo(&mut doc).is_some() {}
        assert_eq!(snapshot(&doc), final_state);
    }

    #[test]
    fn push_truncates_redo_tail() {
        let mut doc = Document::new();
        let mut log = CommandLog::default();
        let a = doc.allocate_id();
        let b = doc.allocate_id();
        log.push(Command::add("Add Circle", vec![(a, circle("A", 0.0, 0.0))]), &mut doc);
        log.push(Command::add("Add Circle", vec![(b, circle("B", 0.0, 0.0))]), &mut doc);
        log.undo(&mut doc);
        assert!(log.can_redo());
        assert_eq!(log.redo_text(), Some("Add Circle"));

        let c = doc.allocate_id();
        log.push(Command::add("Add Circle", vec![(c, circle("C", 0.0, 0.0))]), &mut doc);
        assert!(!log.can_redo());
        assert_eq!(log.len(), 2);
        assert!(doc.contains(a));
        assert!(!doc.contains(b));
        assert!(doc.contains(c));
    }

    #[test]
    fn oldest_commands_are_evicted_past_limit() {
        let mut doc = Document::new();
        let mut log = CommandLog::new(3);
        let mut ids = Vec::new();
        for index in 0..5 {
            let id = doc.allocate_id();
            ids.push(id);
            log.push(
                Command::add(
                    format!("Add #{index}"),
                    vec![(id, circle(&index.to_string(), 0.0, 0.0))],
                ),
                &mut doc,
            );
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.cursor(), 3);
        assert_eq!(log.undo_text(), Some("Add #4"));

        let mut undone = 0;
        while log.undo(&mut doc).is_some() {
            undone += 1;
        }
        assert_eq!(undone, 3);
        // 前两条命令已被丢弃，对应实体保留
        assert!(doc.contains(ids[0]));
        assert!(doc.contains(ids[1]));
        assert_eq!(doc.entity_count(), 2);
    }

    #[test]
    fn set_background_swaps_and_restores() {
        let mut doc = Document::new();
        let mut log = CommandLog::default();
        log.push(
            Command::set_background(
                "Import Image",
                Background::image("scan.png", 320, 200),
                Background::Default,
            ),
            &mut doc,
        );
        assert!(doc.background().is_image());
        assert_eq!(doc.scene_bounds().width(), 320.0);

        log.undo(&mut doc);
        assert_eq!(doc.background(), &Background::Default);
        assert_eq!(doc.scene_bounds().width(), 1000.0);
        assert_eq!(doc.scene_bounds().height(), 800.0);

        log.redo(&mut doc);
        assert_eq!(doc.scene_bounds().height(), 200.0);
    }

    #[test]
    fn clear_drops_everything() {
        let mut doc = Document::new();
        let mut log = CommandLog::default();
        let a = doc.allocate_id();
        log.push(Command::add("Add Circle", vec![(a, circle("A", 0.0, 0.0))]), &mut doc);
        log.clear();
        assert!(log.is_empty());
        assert!(!log.can_undo());
        assert!(log.undo_text().is_none());
        assert!(doc.contains(a));
    }
}
