pub mod registry;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。场景坐标系 y 轴向下。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维位移向量，用于拖拽、微移与对齐。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        pub const ZERO: Vector2 = Vector2(DVec2::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn is_zero(self) -> bool {
            self.0 == DVec2::ZERO
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框。`min` 为左上角，`max` 为右下角。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        /// 由原点与尺寸构造。
        #[inline]
        pub fn from_origin_size(origin: Point2, width: f64, height: f64) -> Self {
            Self::new(origin, Point2::new(origin.x() + width, origin.y() + height))
        }

        /// 由任意两个角点构造规范化（宽高非负）的边界框。
        pub fn from_corners(a: Point2, b: Point2) -> Self {
            let min = a.as_vec2().min(b.as_vec2());
            let max = a.as_vec2().max(b.as_vec2());
            Self::new(Point2::from_vec(min), Point2::from_vec(max))
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn left(&self) -> f64 {
            self.min.x()
        }

        #[inline]
        pub fn right(&self) -> f64 {
            self.max.x()
        }

        #[inline]
        pub fn top(&self) -> f64 {
            self.min.y()
        }

        #[inline]
        pub fn bottom(&self) -> f64 {
            self.max.y()
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }

        /// 两个边界框是否相交（含边界接触）。
        pub fn intersects(&self, other: &Bounds2D) -> bool {
            if self.is_empty() || other.is_empty() {
                return false;
            }
            self.min.x() <= other.max.x()
                && other.min.x() <= self.max.x()
                && self.min.y() <= other.max.y()
                && other.min.y() <= self.max.y()
        }

        #[inline]
        pub fn translate(&self, offset: Vector2) -> Self {
            Self::new(self.min.translate(offset), self.max.translate(offset))
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }
}

pub mod document {
    use std::fmt;
    use std::path::{Path, PathBuf};

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};
    use crate::registry::IdRegistry;

    /// 第二类标签的 id 后缀。
    pub const LABEL2_SUFFIX: &str = "**";

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for EntityId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{}", self.0)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum EntityKind {
        Circle,
        Label,
        Label2,
        Rectangle,
    }

    impl EntityKind {
        /// 持久化格式中的类型标记。
        pub fn as_str(self) -> &'static str {
            match self {
                EntityKind::Circle => "CIRCLE",
                EntityKind::Label => "LABEL",
                EntityKind::Label2 => "LABEL2",
                EntityKind::Rectangle => "RECTANGLE",
            }
        }

        pub fn describe(self) -> &'static str {
            match self {
                EntityKind::Circle => "Circle",
                EntityKind::Label => "Label",
                EntityKind::Label2 => "Label 2",
                EntityKind::Rectangle => "Rectangle",
            }
        }
    }

    impl fmt::Display for EntityKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// 圆形标注。`center` 即实体位置，`highlighted` 只是视图状态。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub id: String,
        pub center: Point2,
        #[serde(skip)]
        pub highlighted: bool,
    }

    impl Circle {
        pub fn new(id: impl Into<String>, center: Point2) -> Self {
            Self {
                id: id.into(),
                center,
                highlighted: false,
            }
        }
    }

    /// 文本标签，Label 与 Label2 共用。`position` 为文本框左上角。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Label {
        pub id: String,
        pub position: Point2,
    }

    impl Label {
        /// 合成 `"{circle}.{sequence}"` 形式的主标签。
        pub fn primary(circle_id: &str, sequence: u32, position: Point2) -> Self {
            Self {
                id: primary_label_id(circle_id, sequence),
                position,
            }
        }

        /// 合成 `"{circle}.{sequence}**"` 形式的第二类标签。
        pub fn secondary(circle_id: &str, sequence: u32, position: Point2) -> Self {
            Self {
                id: secondary_label_id(circle_id, sequence),
                position,
            }
        }

        /// 使用已有 id（例如从文件恢复）构造标签，不做格式校验。
        pub fn with_id(id: impl Into<String>, position: Point2) -> Self {
            Self {
                id: id.into(),
                position,
            }
        }
    }

    pub fn primary_label_id(circle_id: &str, sequence: u32) -> String {
        format!("{circle_id}.{sequence}")
    }

    pub fn secondary_label_id(circle_id: &str, sequence: u32) -> String {
        format!("{circle_id}.{sequence}{LABEL2_SUFFIX}")
    }

    /// 矩形标注。尺寸在绘制时确定，之后只会移动。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Rectangle {
        pub circle_id: String,
        pub sub_id: u32,
        pub text: String,
        pub position: Point2,
        pub width: f64,
        pub height: f64,
    }

    impl Rectangle {
        pub fn new(
            circle_id: impl Into<String>,
            sub_id: u32,
            text: impl Into<String>,
            position: Point2,
            width: f64,
            height: f64,
        ) -> Self {
            Self {
                circle_id: circle_id.into(),
                sub_id,
                text: text.into(),
                position,
                width,
                height,
            }
        }

        /// `circleId.subId.text`，也是矩形下方显示的标题。
        pub fn compound_key(&self) -> String {
            format!("{}.{}.{}", self.circle_id, self.sub_id, self.text)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Entity {
        Circle(Circle),
        Label(Label),
        Label2(Label),
        Rectangle(Rectangle),
    }

    impl Entity {
        #[inline]
        pub fn kind(&self) -> EntityKind {
            match self {
                Entity::Circle(_) => EntityKind::Circle,
                Entity::Label(_) => EntityKind::Label,
                Entity::Label2(_) => EntityKind::Label2,
                Entity::Rectangle(_) => EntityKind::Rectangle,
            }
        }

        /// 主标识。矩形返回其所属圆的 id。
        #[inline]
        pub fn id(&self) -> &str {
            match self {
                Entity::Circle(circle) => &circle.id,
                Entity::Label(label) | Entity::Label2(label) => &label.id,
                Entity::Rectangle(rect) => &rect.circle_id,
            }
        }

        #[inline]
        pub fn position(&self) -> Point2 {
            match self {
                Entity::Circle(circle) => circle.center,
                Entity::Label(label) | Entity::Label2(label) => label.position,
                Entity::Rectangle(rect) => rect.position,
            }
        }

        pub fn set_position(&mut self, position: Point2) {
            match self {
                Entity::Circle(circle) => circle.center = position,
                Entity::Label(label) | Entity::Label2(label) => label.position = position,
                Entity::Rectangle(rect) => rect.position = position,
            }
        }

        #[inline]
        pub fn translate(&mut self, offset: Vector2) {
            let moved = self.position().translate(offset);
            self.set_position(moved);
        }

        /// 场景坐标下的轴对齐包围盒，对齐与分布均以此为准。
        pub fn bounds(&self, metrics: &EntityMetrics) -> Bounds2D {
            match self {
                Entity::Circle(circle) => {
                    let r = metrics.circle_radius;
                    Bounds2D::new(
                        Point2::new(circle.center.x() - r, circle.center.y() - r),
                        Point2::new(circle.center.x() + r, circle.center.y() + r),
                    )
                }
                Entity::Label(label) | Entity::Label2(label) => {
                    let (width, height) = metrics.label_extent(&label.id);
                    Bounds2D::from_origin_size(label.position, width, height)
                }
                Entity::Rectangle(rect) => {
                    Bounds2D::from_origin_size(rect.position, rect.width, rect.height)
                }
            }
        }

        /// 命中测试：圆按实际形状，其余按包围盒。
        pub fn hit_test(&self, point: Point2, metrics: &EntityMetrics) -> bool {
            match self {
                Entity::Circle(circle) => {
                    let r = metrics.circle_radius;
                    circle.center.vector_to(point).length_squared() <= r * r
                }
                _ => self.bounds(metrics).contains(point),
            }
        }

        #[inline]
        pub fn as_circle(&self) -> Option<&Circle> {
            match self {
                Entity::Circle(circle) => Some(circle),
                _ => None,
            }
        }
    }

    /// 估算实体外形所需的尺寸参数。渲染层之外没有字体信息，标签宽度按字符数近似。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct EntityMetrics {
        pub circle_radius: f64,
        pub label_char_width: f64,
        pub label_line_height: f64,
        pub label_padding: f64,
    }

    impl EntityMetrics {
        pub fn label_extent(&self, text: &str) -> (f64, f64) {
            let chars = text.chars().count() as f64;
            (
                chars * self.label_char_width + 2.0 * self.label_padding,
                self.label_line_height,
            )
        }
    }

    impl Default for EntityMetrics {
        fn default() -> Self {
            Self {
                circle_radius: 25.0,
                label_char_width: 11.0,
                label_line_height: 26.0,
                label_padding: 4.0,
            }
        }
    }

    /// 场景背景：默认画布或外部图片（仅保存路径与像素尺寸）。
    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    pub enum Background {
        #[default]
        Default,
        Image {
            path: PathBuf,
            width: u32,
            height: u32,
        },
    }

    impl Background {
        pub fn image(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
            Background::Image {
                path: path.into(),
                width,
                height,
            }
        }

        #[inline]
        pub fn path(&self) -> Option<&Path> {
            match self {
                Background::Default => None,
                Background::Image { path, .. } => Some(path),
            }
        }

        #[inline]
        pub fn is_image(&self) -> bool {
            matches!(self, Background::Image { .. })
        }
    }

    /// 标注文档：实体集合（按创建顺序，越靠后越处于上层）与背景。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Document {
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        background: Background,
        canvas_width: f64,
        canvas_height: f64,
        metrics: EntityMetrics,
    }

    pub const DEFAULT_CANVAS_WIDTH: f64 = 1000.0;
    pub const DEFAULT_CANVAS_HEIGHT: f64 = 800.0;

    impl Document {
        pub fn new() -> Self {
            Self::with_canvas(
                DEFAULT_CANVAS_WIDTH,
                DEFAULT_CANVAS_HEIGHT,
                EntityMetrics::default(),
            )
        }

        pub fn with_canvas(width: f64, height: f64, metrics: EntityMetrics) -> Self {
            Self {
                entities: Vec::new(),
                next_entity_id: 0,
                background: Background::Default,
                canvas_width: width,
                canvas_height: height,
                metrics,
            }
        }

        /// 同样的画布与度量参数，但不含实体、使用默认背景。
        pub fn empty_like(&self) -> Self {
            Self::with_canvas(self.canvas_width, self.canvas_height, self.metrics)
        }

        #[inline]
        pub fn metrics(&self) -> &EntityMetrics {
            &self.metrics
        }

        #[inline]
        pub fn registry(&self) -> IdRegistry<'_> {
            IdRegistry::new(self)
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let id = self.allocate_id();
            self.entities.push((id, entity));
            id
        }

        /// 以既有 id 重新放回实体（撤销删除时使用），保持按 id 的层叠顺序。
        /// id 已存在时返回 `false` 且不做修改。
        pub fn insert_entity(&mut self, id: EntityId, entity: Entity) -> bool {
            match self.entities.binary_search_by_key(&id, |(existing, _)| *existing) {
                Ok(_) => false,
                Err(index) => {
                    self.entities.insert(index, (id, entity));
                    self.next_entity_id = self.next_entity_id.max(id.get() + 1);
                    true
                }
            }
        }

        pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
            let index = self.index_of(id)?;
            Some(self.entities.remove(index).1)
        }

        #[inline]
        pub fn contains(&self, id: EntityId) -> bool {
            self.index_of(id).is_some()
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.index_of(id).map(|index| &self.entities[index].1)
        }

        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
            let index = self.index_of(id)?;
            Some(&mut self.entities[index].1)
        }

        pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
            self.entities.iter().map(|(id, entity)| (*id, entity))
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entities.is_empty()
        }

        pub fn position(&self, id: EntityId) -> Option<Point2> {
            self.entity(id).map(Entity::position)
        }

        /// 设置实体位置，实体不存在时返回 `false`。
        pub fn set_position(&mut self, id: EntityId, position: Point2) -> bool {
            match self.entity_mut(id) {
                Some(entity) => {
                    entity.set_position(position);
                    true
                }
                None => false,
            }
        }

        pub fn entity_bounds(&self, id: EntityId) -> Option<Bounds2D> {
            self.entity(id).map(|entity| entity.bounds(&self.metrics))
        }

        pub fn circles(&self) -> impl Iterator<Item = (EntityId, &Circle)> {
            self.entities()
                .filter_map(|(id, entity)| entity.as_circle().map(|circle| (id, circle)))
        }

        pub fn find_circle(&self, circle_id: &str) -> Option<EntityId> {
            self.circles()
                .find(|(_, circle)| circle.id == circle_id)
                .map(|(id, _)| id)
        }

        /// 点下的所有实体，从上层到下层。
        pub fn entities_at(&self, point: Point2) -> Vec<EntityId> {
            self.entities
                .iter()
                .rev()
                .filter(|(_, entity)| entity.hit_test(point, &self.metrics))
                .map(|(id, _)| *id)
                .collect()
        }

        /// 最上层命中的实体。
        pub fn hit_test(&self, point: Point2) -> Option<EntityId> {
            self.entities_at(point).into_iter().next()
        }

        /// 包围盒与给定区域相交的实体（橡皮筋选择）。
        pub fn entities_intersecting(&self, area: &Bounds2D) -> Vec<EntityId> {
            self.entities
                .iter()
                .filter(|(_, entity)| entity.bounds(&self.metrics).intersects(area))
                .map(|(id, _)| *id)
                .collect()
        }

        /// 按当前活动圆刷新所有圆的高亮状态。
        pub fn refresh_circle_highlights(&mut self, active: Option<&str>) {
            for (_, entity) in &mut self.entities {
                if let Entity::Circle(circle) = entity {
                    circle.highlighted = active == Some(circle.id.as_str());
                }
            }
        }

        #[inline]
        pub fn background(&self) -> &Background {
            &self.background
        }

        /// 替换背景并返回旧背景。
        pub fn set_background(&mut self, background: Background) -> Background {
            std::mem::replace(&mut self.background, background)
        }

        /// 场景范围：图片背景取图片尺寸，否则为默认画布。
        pub fn scene_bounds(&self) -> Bounds2D {
            let origin = Point2::new(0.0, 0.0);
            match &self.background {
                Background::Image { width, height, .. } => {
                    Bounds2D::from_origin_size(origin, f64::from(*width), f64::from(*height))
                }
                Background::Default => {
                    Bounds2D::from_origin_size(origin, self.canvas_width, self.canvas_height)
                }
            }
        }

        fn index_of(&self, id: EntityId) -> Option<usize> {
            self.entities
                .binary_search_by_key(&id, |(existing, _)| *existing)
                .ok()
        }

        /// 预留一个新的实体 id，供命令在执行前引用。
        pub fn allocate_id(&mut self) -> EntityId {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }
    }

    impl Default for Document {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::document::*;
    use super::geometry::*;

    #[test]
    fn bounds_from_corners_is_normalized() {
        let bounds = Bounds2D::from_corners(Point2::new(30.0, 40.0), Point2::new(10.0, 5.0));
        assert_eq!(bounds.left(), 10.0);
        assert_eq!(bounds.top(), 5.0);
        assert_eq!(bounds.width(), 20.0);
        assert_eq!(bounds.height(), 35.0);
        assert!(bounds.contains(Point2::new(20.0, 20.0)));
        assert!(!bounds.contains(Point2::new(31.0, 20.0)));
    }

    #[test]
    fn bounds_intersection_and_translation() {
        let a = Bounds2D::from_origin_size(Point2::new(0.0, 0.0), 10.0, 10.0);
        let b = Bounds2D::from_origin_size(Point2::new(5.0, 5.0), 10.0, 10.0);
        let c = b.translate(Vector2::new(20.0, 0.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&Bounds2D::empty()));
        let center = c.center();
        assert!((center.x() - 30.0).abs() < 1e-9);
        assert!((center.y() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn document_keeps_creation_order_and_reinserts_in_place() {
        let mut doc = Document::new();
        let a = doc.add_entity(Entity::Circle(Circle::new("A", Point2::new(0.0, 0.0))));
        let b = doc.add_entity(Entity::Label(Label::primary("A", 1, Point2::new(5.0, 5.0))));
        let c = doc.add_entity(Entity::Label2(Label::secondary(
            "A",
            1,
            Point2::new(9.0, 9.0),
        )));
        assert_eq!(a.get(), 0);
        assert_eq!(c.get(), 2);

        let removed = doc.remove_entity(b).expect("label exists");
        assert_eq!(removed.id(), "A.1");
        assert!(!doc.contains(b));

        assert!(doc.insert_entity(b, removed.clone()));
        assert!(!doc.insert_entity(b, removed));
        let order: Vec<_> = doc.entities().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b, c]);

        let next = doc.add_entity(Entity::Circle(Circle::new("B", Point2::new(1.0, 1.0))));
        assert_eq!(next.get(), 3);
    }

    #[test]
    fn label_ids_are_synthesized_from_circle_and_sequence() {
        let label = Label::primary("7", 3, Point2::new(0.0, 0.0));
        let label2 = Label::secondary("7", 3, Point2::new(0.0, 0.0));
        assert_eq!(label.id, "7.3");
        assert_eq!(label2.id, "7.3**");
    }

    #[test]
    fn entity_bounds_follow_kind() {
        let metrics = EntityMetrics::default();
        let circle = Entity::Circle(Circle::new("A", Point2::new(100.0, 100.0)));
        let bounds = circle.bounds(&metrics);
        assert_eq!(bounds.left(), 75.0);
        assert_eq!(bounds.bottom(), 125.0);
        assert!(circle.hit_test(Point2::new(110.0, 110.0), &metrics));
        // 包围盒角落不在圆内
        assert!(!circle.hit_test(Point2::new(124.0, 124.0), &metrics));

        let rect = Entity::Rectangle(Rectangle::new(
            "A",
            1,
            "door",
            Point2::new(10.0, 20.0),
            30.0,
            40.0,
        ));
        let bounds = rect.bounds(&metrics);
        assert_eq!(bounds.right(), 40.0);
        assert_eq!(bounds.bottom(), 60.0);

        let label = Entity::Label(Label::with_id("A.1", Point2::new(0.0, 0.0)));
        let bounds = label.bounds(&metrics);
        assert!((bounds.width() - (3.0 * 11.0 + 8.0)).abs() < 1e-9);
        assert!((bounds.height() - 26.0).abs() < 1e-9);
    }

    #[test]
    fn hit_test_prefers_topmost_entity() {
        let mut doc = Document::new();
        let below = doc.add_entity(Entity::Rectangle(Rectangle::new(
            "A",
            1,
            "x",
            Point2::new(0.0, 0.0),
            100.0,
            100.0,
        )));
        let above = doc.add_entity(Entity::Circle(Circle::new("A", Point2::new(50.0, 50.0))));
        assert_eq!(doc.hit_test(Point2::new(50.0, 50.0)), Some(above));
        assert_eq!(doc.entities_at(Point2::new(50.0, 50.0)), vec![above, below]);
        assert_eq!(doc.hit_test(Point2::new(5.0, 5.0)), Some(below));
        assert_eq!(doc.hit_test(Point2::new(500.0, 500.0)), None);
    }

    #[test]
    fn circle_highlights_follow_active_id() {
        let mut doc = Document::new();
        let a = doc.add_entity(Entity::Circle(Circle::new("A", Point2::new(0.0, 0.0))));
        let b = doc.add_entity(Entity::Circle(Circle::new("B", Point2::new(90.0, 0.0))));
        doc.refresh_circle_highlights(Some("B"));
        let highlighted = |doc: &Document, id| {
            doc.entity(id)
                .and_then(Entity::as_circle)
                .map(|circle| circle.highlighted)
        };
        assert_eq!(highlighted(&doc, a), Some(false));
        assert_eq!(highlighted(&doc, b), Some(true));
        doc.refresh_circle_highlights(None);
        assert_eq!(highlighted(&doc, b), Some(false));
    }

    #[test]
    fn scene_bounds_follow_background() {
        let mut doc = Document::new();
        assert_eq!(doc.scene_bounds().width(), DEFAULT_CANVAS_WIDTH);
        assert_eq!(doc.scene_bounds().height(), DEFAULT_CANVAS_HEIGHT);

        let old = doc.set_background(Background::image("photo.png", 640, 480));
        assert_eq!(old, Background::Default);
        assert_eq!(doc.scene_bounds().width(), 640.0);
        assert_eq!(
            doc.background().path().map(|p| p.to_string_lossy().into_owned()),
            Some("photo.png".to_string())
        );
    }
}
