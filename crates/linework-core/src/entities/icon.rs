//! Icon entity: a built-in symbol or an imported picture.

use super::label::{box_handles, handle_position, resize_factor};
use super::{EntityId, EntityMeta, EntityTrait, Style};
use crate::geometry;
use crate::selection::{Handle, HandleKind};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Side length of an icon at scale 1.0, in document units.
pub const ICON_BASE_SIZE: f64 = 16.0;
/// Smallest scale a resize can produce.
pub const MIN_ICON_SCALE: f64 = 0.05;

fn default_scale() -> f64 {
    1.0
}

/// What an icon draws.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IconRef {
    /// One of the built-in symbols, by name.
    Builtin { name: String },
    /// A picture in the project's asset directory, by relative path.
    Picture { path: String },
}

impl IconRef {
    pub fn builtin(name: impl Into<String>) -> Self {
        IconRef::Builtin { name: name.into() }
    }

    pub fn picture(path: impl Into<String>) -> Self {
        IconRef::Picture { path: path.into() }
    }
}

/// An icon centred on `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub icon: IconRef,
    /// Icon centre.
    pub position: Point,
    /// Rotation in degrees about `position`, clockwise on screen.
    #[serde(default)]
    pub rotation: f64,
    /// Multiplier of [`ICON_BASE_SIZE`].
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub style: Style,
}

impl IconEntity {
    pub fn new(icon: IconRef, position: Point) -> Self {
        Self {
            meta: EntityMeta::new(),
            icon,
            position,
            rotation: 0.0,
            scale: 1.0,
            style: Style::default(),
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.meta.id = id;
        self
    }

    /// Side length of the icon's square extent.
    pub fn extent(&self) -> f64 {
        ICON_BASE_SIZE * self.scale
    }

    /// Unrotated extent in document coordinates.
    pub fn local_box(&self) -> Rect {
        let half = self.extent() / 2.0;
        Rect::new(
            self.position.x - half,
            self.position.y - half,
            self.position.x + half,
            self.position.y + half,
        )
    }

    pub fn corners(&self) -> [Point; 4] {
        geometry::rotated_rect_corners(self.local_box(), self.position, self.rotation)
    }
}

impl EntityTrait for IconEntity {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn bounds(&self) -> Rect {
        geometry::bounds_of_points(&self.corners()).unwrap_or(Rect::ZERO)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        geometry::rotated_box_contains(self.local_box(), self.position, self.rotation, point, tolerance)
    }

    fn intersects_rect(&self, rect: Rect) -> bool {
        geometry::polygon_intersects_rect(&self.corners(), rect)
    }

    fn defining_points(&self) -> Vec<Point> {
        let mut pts = vec![self.position];
        pts.extend(self.corners());
        pts
    }

    fn snap_points(&self) -> Vec<Point> {
        vec![self.position]
    }

    fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }

    fn handles(&self) -> Vec<Handle> {
        box_handles(self.local_box(), self.position, self.rotation)
    }

    fn move_handle(&mut self, kind: HandleKind, to: Point) -> bool {
        let Some(from) = handle_position(&self.handles(), kind) else {
            return false;
        };
        match resize_factor(self.position, from, to) {
            Some(factor) => {
                self.scale = (self.scale * factor).max(MIN_ICON_SCALE);
                true
            }
            None => false,
        }
    }
}
