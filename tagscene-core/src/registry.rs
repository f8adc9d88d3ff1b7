//! 标识符查询：唯一性检查与下一个可用序号。
//!
//! 所有查询都直接扫描当前实体集合，不维护额外索引。

use crate::document::{Document, Entity, LABEL2_SUFFIX};

/// 文档上的只读标识符视图。
#[derive(Debug, Clone, Copy)]
pub struct IdRegistry<'a> {
    document: &'a Document,
}

impl<'a> IdRegistry<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn circle_exists(&self, id: &str) -> bool {
        self.document.circles().any(|(_, circle)| circle.id == id)
    }

    pub fn label_exists(&self, full_id: &str) -> bool {
        self.document
            .entities()
            .any(|(_, entity)| matches!(entity, Entity::Label(label) if label.id == full_id))
    }

    pub fn label2_exists(&self, full_id: &str) -> bool {
        self.document
            .entities()
            .any(|(_, entity)| matches!(entity, Entity::Label2(label) if label.id == full_id))
    }

    pub fn rectangle_compound_exists(&self, circle_id: &str, sub_id: u32, text: &str) -> bool {
        self.document.entities().any(|(_, entity)| {
            matches!(
                entity,
                Entity::Rectangle(rect)
                    if rect.circle_id == circle_id && rect.sub_id == sub_id && rect.text == text
            )
        })
    }

    /// 指定圆下一个 Label 序号：已有最大序号 + 1，没有圆或没有标签时为 1。
    pub fn next_label_sequence(&self, circle_id: Option<&str>) -> u32 {
        let Some(circle_id) = circle_id else {
            return 1;
        };
        let prefix = format!("{circle_id}.");
        let max = self
            .document
            .entities()
            .filter_map(|(_, entity)| match entity {
                Entity::Label(label) => parse_sequence(&label.id, &prefix),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        max.saturating_add(1)
    }

    /// 与 [`next_label_sequence`](Self::next_label_sequence) 相同，但只统计以 `**` 结尾的 Label2。
    pub fn next_label2_sequence(&self, circle_id: Option<&str>) -> u32 {
        let Some(circle_id) = circle_id else {
            return 1;
        };
        let prefix = format!("{circle_id}.");
        let max = self
            .document
            .entities()
            .filter_map(|(_, entity)| match entity {
                Entity::Label2(label) => label
                    .id
                    .strip_suffix(LABEL2_SUFFIX)
                    .and_then(|id| parse_sequence(id, &prefix)),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        max.saturating_add(1)
    }
}

/// 解析前缀之后的整数序号；格式不合法时返回 `None`（静默跳过）。
fn parse_sequence(id: &str, prefix: &str) -> Option<u32> {
    id.strip_prefix(prefix)?.trim().parse().ok()
}
