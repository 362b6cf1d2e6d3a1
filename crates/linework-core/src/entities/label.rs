//! Text label entity.

use super::{Anchor, Colour, EntityId, EntityMeta, EntityTrait};
use crate::geometry;
use crate::selection::{Corner, Edge, Handle, HandleKind};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Default font size in document units.
pub const DEFAULT_FONT_SIZE: f64 = 12.0;
/// Smallest font size a resize can produce.
pub const MIN_FONT_SIZE: f64 = 1.0;

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_FACTOR: f64 = 0.6;
/// Line height as a fraction of the font size.
const LINE_HEIGHT_FACTOR: f64 = 1.2;

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

/// A single-line text label placed at an anchor point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub text: String,
    /// The anchor point; `anchor` decides which part of the text box sits here.
    pub position: Point,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Rotation in degrees about `position`, clockwise on screen.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub colour: Colour,
    #[serde(default)]
    pub anchor: Anchor,
}

impl LabelEntity {
    pub fn new(position: Point, text: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(),
            text: text.into(),
            position,
            font_size: DEFAULT_FONT_SIZE,
            rotation: 0.0,
            colour: Colour::black(),
            anchor: Anchor::default(),
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.meta.id = id;
        self
    }

    /// Estimated text box size.
    ///
    /// There are no font metrics in the core, so the box is approximated from
    /// the character count. Empty labels keep the width of one character.
    pub fn size(&self) -> (f64, f64) {
        let chars = self.text.chars().count().max(1) as f64;
        (
            chars * self.font_size * CHAR_WIDTH_FACTOR,
            self.font_size * LINE_HEIGHT_FACTOR,
        )
    }

    /// Unrotated text box in document coordinates.
    pub fn local_box(&self) -> Rect {
        let (w, h) = self.size();
        self.anchor.local_box(w, h) + self.position.to_vec2()
    }

    /// Corners of the rotated text box.
    pub fn corners(&self) -> [Point; 4] {
        geometry::rotated_rect_corners(self.local_box(), self.position, self.rotation)
    }
}

impl EntityTrait for LabelEntity {
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
        let [tl, _, br, _] = self.corners();
        let centre = tl.midpoint(br);
        match resize_factor(centre, from, to) {
            Some(factor) => {
                self.font_size = (self.font_size * factor).max(MIN_FONT_SIZE);
                true
            }
            None => false,
        }
    }
}

/// Corner and edge handles of a box rotated by `degrees` about `pivot`.
pub(crate) fn box_handles(local: Rect, pivot: Point, degrees: f64) -> Vec<Handle> {
    let [tl, tr, br, bl] = geometry::rotated_rect_corners(local, pivot, degrees);
    vec![
        Handle::new(tl, HandleKind::Corner(Corner::TopLeft)),
        Handle::new(tr, HandleKind::Corner(Corner::TopRight)),
        Handle::new(br, HandleKind::Corner(Corner::BottomRight)),
        Handle::new(bl, HandleKind::Corner(Corner::BottomLeft)),
        Handle::new(tl.midpoint(tr), HandleKind::Edge(Edge::Top)),
        Handle::new(tr.midpoint(br), HandleKind::Edge(Edge::Right)),
        Handle::new(br.midpoint(bl), HandleKind::Edge(Edge::Bottom)),
        Handle::new(bl.midpoint(tl), HandleKind::Edge(Edge::Left)),
    ]
}

pub(crate) fn handle_position(handles: &[Handle], kind: HandleKind) -> Option<Point> {
    handles.iter().find(|h| h.kind == kind).map(|h| h.position)
}

/// Uniform scale factor moving a handle from `from` to `to` relative to `centre`.
pub(crate) fn resize_factor(centre: Point, from: Point, to: Point) -> Option<f64> {
    let before = geometry::distance(centre, from);
    if before < geometry::EPSILON {
        return None;
    }
    let factor = geometry::distance(centre, to) / before;
    (factor.is_finite() && factor > 0.0).then_some(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_box_follows_anchor() {
        let mut label = LabelEntity::new(Point::new(100.0, 100.0), "ab");
        label.font_size = 10.0;
        assert_eq!(label.local_box(), Rect::new(100.0, 100.0, 112.0, 112.0));
        label.anchor = Anchor::Se;
        assert_eq!(label.local_box(), Rect::new(88.0, 88.0, 100.0, 100.0));
    }

    #[test]
    fn test_rotated_label_hit() {
        let mut label = LabelEntity::new(Point::new(0.0, 0.0), "abcdefghij");
        label.font_size = 10.0;
        // Box spans x in 0..60, y in 0..12
        assert!(label.hit_test(Point::new(50.0, 5.0), 0.0));
        label.rotation = 90.0;
        assert!(!label.hit_test(Point::new(50.0, 5.0), 0.0));
        assert!(label.hit_test(Point::new(-5.0, 50.0), 0.0));
    }

    #[test]
    fn test_corner_resize_scales_font() {
        let mut label = LabelEntity::new(Point::new(0.0, 0.0), "abcd");
        label.font_size = 10.0;
        label.anchor = Anchor::Center;
        let corner = handle_position(&label.handles(), HandleKind::Corner(Corner::BottomRight)).unwrap();
        let to = Point::new(corner.x * 2.0, corner.y * 2.0);
        assert!(label.move_handle(HandleKind::Corner(Corner::BottomRight), to));
        assert!((label.font_size - 20.0).abs() < 1e-9);
        assert!(!label.move_handle(HandleKind::Vertex(0), to));
    }
}
