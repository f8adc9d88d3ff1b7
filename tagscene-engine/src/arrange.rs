//! 对齐、分布与方向微移的纯计算部分，结果以移动记录返回，由编辑器打包成一条命令。

use std::fmt;
use std::str::FromStr;

use tagscene_core::document::EntityId;
use tagscene_core::geometry::{Bounds2D, Point2, Vector2};
use thiserror::Error;

use crate::history::MoveRecord;

/// 对齐所需的最少实体数。
pub const MIN_ALIGN_ITEMS: usize = 2;
/// 分布所需的最少实体数。
pub const MIN_DISTRIBUTE_ITEMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignEdge {
    Left,
    Right,
    Top,
    Bottom,
}

impl AlignEdge {
    pub fn as_str(self) -> &'static str {
        match self {
            AlignEdge::Left => "left",
            AlignEdge::Right => "right",
            AlignEdge::Top => "top",
            AlignEdge::Bottom => "bottom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn as_str(self) -> &'static str {
        match self {
            Axis::Horizontal => "horizontal",
            Axis::Vertical => "vertical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// 该方向上步长为 `step` 的位移（y 轴向下）。
    pub fn offset(self, step: f64) -> Vector2 {
        match self {
            Direction::Left => Vector2::new(-step, 0.0),
            Direction::Right => Vector2::new(step, 0.0),
            Direction::Up => Vector2::new(0.0, -step),
            Direction::Down => Vector2::new(0.0, step),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseArrangeError {
    kind: &'static str,
    value: String,
}

impl ParseArrangeError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for AlignEdge {
    type Err = ParseArrangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(AlignEdge::Left),
            "right" => Ok(AlignEdge::Right),
            "top" => Ok(AlignEdge::Top),
            "bottom" => Ok(AlignEdge::Bottom),
            _ => Err(ParseArrangeError::new("align edge", s)),
        }
    }
}

impl FromStr for Axis {
    type Err = ParseArrangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "horizontal" | "h" | "x" => Ok(Axis::Horizontal),
            "vertical" | "v" | "y" => Ok(Axis::Vertical),
            _ => Err(ParseArrangeError::new("distribute axis", s)),
        }
    }
}

impl FromStr for Direction {
    type Err = ParseArrangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            _ => Err(ParseArrangeError::new("direction", s)),
        }
    }
}

impl fmt::Display for AlignEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 参与排列的实体：当前位置与场景包围盒。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub id: EntityId,
    pub position: Point2,
    pub bounds: Bounds2D,
}

impl Placement {
    fn shifted(&self, offset: Vector2) -> MoveRecord {
        MoveRecord {
            id: self.id,
            from: self.position,
            to: self.position.translate(offset),
        }
    }
}

/// 把每个实体的指定边对齐到所有实体中最外侧的那条边。位移为零的实体不产生记录。
pub fn align(items: &[Placement], edge: AlignEdge) -> Vec<MoveRecord> {
    if items.len() < MIN_ALIGN_ITEMS {
        return Vec::new();
    }
    let edges = items.iter().map(|item| edge_of(&item.bounds, edge));
    let target = match edge {
        AlignEdge::Left | AlignEdge::Top => edges.fold(f64::INFINITY, f64::min),
        AlignEdge::Right | AlignEdge::Bottom => edges.fold(f64::NEG_INFINITY, f64::max),
    };

    items
        .iter()
        .filter_map(|item| {
            let delta = target - edge_of(&item.bounds, edge);
            let offset = match edge {
                AlignEdge::Left | AlignEdge::Right => Vector2::new(delta, 0.0),
                AlignEdge::Top | AlignEdge::Bottom => Vector2::new(0.0, delta),
            };
            (!offset.is_zero()).then(|| item.shifted(offset))
        })
        .collect()
}

/// 以首尾实体中心为锚点，沿轴向等距分布。位移不超过 `tolerance` 的实体不产生记录。
pub fn distribute(items: &[Placement], axis: Axis, tolerance: f64) -> Vec<MoveRecord> {
    if items.len() < MIN_DISTRIBUTE_ITEMS {
        return Vec::new();
    }
    let center_of = |item: &Placement| {
        let center = item.bounds.center();
        match axis {
            Axis::Horizontal => center.x(),
            Axis::Vertical => center.y(),
        }
    };

    let mut sorted: Vec<&Placement> = items.iter().collect();
    sorted.sort_by(|a, b| center_of(a).total_cmp(&center_of(b)));

    let first = center_of(sorted[0]);
    let last = center_of(sorted[sorted.len() - 1]);
    let step = (last - first) / (sorted.len() - 1) as f64;

    sorted
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let delta = first + index as f64 * step - center_of(item);
            if delta.abs() <= tolerance {
                return None;
            }
            let offset = match axis {
                Axis::Horizontal => Vector2::new(delta, 0.0),
                Axis::Vertical => Vector2::new(0.0, delta),
            };
            Some(item.shifted(offset))
        })
        .collect()
}

fn edge_of(bounds: &Bounds2D, edge: AlignEdge) -> f64 {
    match edge {
        AlignEdge::Left => bounds.left(),
        AlignEdge::Right => bounds.right(),
        AlignEdge::Top => bounds.top(),
        AlignEdge::Bottom => bounds.bottom(),
    }
}
