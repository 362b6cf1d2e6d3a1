//! Entity definitions for track diagrams.

mod group;
mod icon;
mod label;
mod line;
mod style;

pub use group::GroupEntity;
pub use icon::{ICON_BASE_SIZE, IconEntity, IconRef, MIN_ICON_SCALE};
pub use label::{DEFAULT_FONT_SIZE, LabelEntity, MIN_FONT_SIZE};
pub use line::LineEntity;
pub use style::{Anchor, Colour, DashPattern, LineCap, LineJoin, Style, StyleDiff};

use crate::selection::{Handle, HandleKind};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for entities.
pub type EntityId = Uuid;

fn default_true() -> bool {
    true
}

/// Fields shared by every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: EntityId,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
}

impl EntityMeta {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            visible: true,
            locked: false,
        }
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Common interface for entities with their own geometry.
pub trait EntityTrait {
    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Axis-aligned bounding box in document coordinates.
    fn bounds(&self) -> Rect;

    /// Check if a point (in document coordinates) hits this entity.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Check if any edge or area of the entity touches `rect`.
    fn intersects_rect(&self, rect: Rect) -> bool;

    /// Points that fully describe the entity's placement.
    fn defining_points(&self) -> Vec<Point>;

    /// Points other geometry may snap onto.
    fn snap_points(&self) -> Vec<Point>;

    fn translate(&mut self, delta: Vec2);

    /// Manipulation handles, in document coordinates.
    fn handles(&self) -> Vec<Handle>;

    /// Drag a handle to `to`. Returns false when the entity has no such handle
    /// or the move would degenerate it.
    fn move_handle(&mut self, kind: HandleKind, to: Point) -> bool;
}

/// Enum wrapper for all entity kinds (for storage and exhaustive dispatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Line(LineEntity),
    Label(LabelEntity),
    Icon(IconEntity),
    Group(GroupEntity),
}

impl Entity {
    /// Type tags understood by this build, as written to project files.
    pub const KINDS: [&'static str; 4] = ["line", "label", "icon", "group"];

    pub fn meta(&self) -> &EntityMeta {
        match self {
            Entity::Line(e) => &e.meta,
            Entity::Label(e) => &e.meta,
            Entity::Icon(e) => &e.meta,
            Entity::Group(e) => &e.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut EntityMeta {
        match self {
            Entity::Line(e) => &mut e.meta,
            Entity::Label(e) => &mut e.meta,
            Entity::Icon(e) => &mut e.meta,
            Entity::Group(e) => &mut e.meta,
        }
    }

    pub fn id(&self) -> EntityId {
        self.meta().id
    }

    pub fn is_visible(&self) -> bool {
        self.meta().visible
    }

    pub fn is_locked(&self) -> bool {
        self.meta().locked
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Line(_) => "line",
            Entity::Label(_) => "label",
            Entity::Icon(_) => "icon",
            Entity::Group(_) => "group",
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Entity::Group(_))
    }

    /// The geometric view of this entity; `None` for groups.
    pub fn geometry(&self) -> Option<&dyn EntityTrait> {
        match self {
            Entity::Line(e) => Some(e),
            Entity::Label(e) => Some(e),
            Entity::Icon(e) => Some(e),
            Entity::Group(_) => None,
        }
    }

    pub fn geometry_mut(&mut self) -> Option<&mut dyn EntityTrait> {
        match self {
            Entity::Line(e) => Some(e),
            Entity::Label(e) => Some(e),
            Entity::Icon(e) => Some(e),
            Entity::Group(_) => None,
        }
    }

    /// Own bounds; groups report `None` (see `Document::bounds`).
    pub fn bounds(&self) -> Option<Rect> {
        self.geometry().map(|g| g.bounds())
    }

    /// Distance-based hit, `false` for groups.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.geometry().is_some_and(|g| g.hit_test(point, tolerance))
    }

    pub fn intersects_rect(&self, rect: Rect) -> bool {
        self.geometry().is_some_and(|g| g.intersects_rect(rect))
    }

    pub fn defining_points(&self) -> Vec<Point> {
        self.geometry().map(|g| g.defining_points()).unwrap_or_default()
    }

    pub fn snap_points(&self) -> Vec<Point> {
        self.geometry().map(|g| g.snap_points()).unwrap_or_default()
    }

    pub fn translate(&mut self, delta: Vec2) {
        if let Some(g) = self.geometry_mut() {
            g.translate(delta);
        }
    }

    pub fn handles(&self) -> Vec<Handle> {
        self.geometry().map(|g| g.handles()).unwrap_or_default()
    }

    pub fn move_handle(&mut self, kind: HandleKind, to: Point) -> bool {
        self.geometry_mut().is_some_and(|g| g.move_handle(kind, to))
    }

    /// Current values of the fields a `StyleDiff` can touch.
    ///
    /// Labels expose their text colour as the stroke colour. Groups have no
    /// style.
    pub fn style_snapshot(&self) -> Option<Style> {
        match self {
            Entity::Line(e) => Some(e.style.clone()),
            Entity::Icon(e) => Some(e.style.clone()),
            Entity::Label(e) => Some(Style {
                stroke_colour: e.colour,
                ..Style::default()
            }),
            Entity::Group(_) => None,
        }
    }

    /// Apply a style diff, returning the inverse diff. `None` when the entity
    /// cannot carry the requested fields.
    pub fn apply_style(&mut self, diff: &StyleDiff) -> Option<StyleDiff> {
        match self {
            Entity::Line(e) => Some(e.style.apply_diff(diff)),
            Entity::Icon(e) => Some(e.style.apply_diff(diff)),
            Entity::Label(e) => {
                let only_colour = StyleDiff {
                    stroke_colour: diff.stroke_colour,
                    ..StyleDiff::default()
                };
                if only_colour != *diff {
                    return None;
                }
                let mut undo = StyleDiff::default();
                if let Some(c) = diff.stroke_colour {
                    undo.stroke_colour = Some(std::mem::replace(&mut e.colour, c));
                }
                Some(undo)
            }
            Entity::Group(_) => None,
        }
    }

    /// Entity validity as required by storage: finite coordinates and lines
    /// with at least two points.
    pub fn is_well_formed(&self) -> bool {
        let finite = |p: &Point| p.x.is_finite() && p.y.is_finite();
        match self {
            Entity::Line(e) => e.is_valid(),
            Entity::Label(e) => finite(&e.position) && e.font_size.is_finite() && e.font_size > 0.0,
            Entity::Icon(e) => finite(&e.position) && e.scale.is_finite() && e.scale > 0.0,
            Entity::Group(_) => true,
        }
    }
}

impl From<LineEntity> for Entity {
    fn from(e: LineEntity) -> Self {
        Entity::Line(e)
    }
}

impl From<LabelEntity> for Entity {
    fn from(e: LabelEntity) -> Self {
        Entity::Label(e)
    }
}

impl From<IconEntity> for Entity {
    fn from(e: IconEntity) -> Self {
        Entity::Icon(e)
    }
}

impl From<GroupEntity> for Entity {
    fn from(e: GroupEntity) -> Self {
        Entity::Group(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_tagged_serde() {
        let line: Entity = LineEntity::new(Point::new(1.0, 2.0), Point::new(3.0, 4.0), Style::default()).into();
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["type"], "line");
        assert_eq!(json["visible"], true);
        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, line);
    }

    #[test]
    fn test_meta_defaults_when_missing() {
        let id = Uuid::new_v4();
        let json = serde_json::json!({
            "type": "label",
            "id": id,
            "text": "Depot",
            "position": {"x": 1.0, "y": 2.0},
            "future_field": 42
        });
        let entity: Entity = serde_json::from_value(json).unwrap();
        assert!(entity.is_visible());
        assert!(!entity.is_locked());
        match entity {
            Entity::Label(label) => assert_eq!(label.font_size, DEFAULT_FONT_SIZE),
            other => panic!("expected label, got {}", other.kind()),
        }
    }

    #[test]
    fn test_group_has_no_geometry() {
        let group: Entity = GroupEntity::new(vec![]).into();
        assert!(group.bounds().is_none());
        assert!(!group.hit_test(Point::ZERO, 100.0));
        assert!(group.handles().is_empty());
    }

    #[test]
    fn test_label_style_only_colour() {
        let mut label: Entity = LabelEntity::new(Point::ZERO, "x").into();
        assert!(label.apply_style(&StyleDiff::stroke_width(3.0)).is_none());
        let undo = label.apply_style(&StyleDiff::stroke_colour(Colour::rgb(9, 9, 9))).unwrap();
        assert_eq!(undo.stroke_colour, Some(Colour::black()));
    }
}
