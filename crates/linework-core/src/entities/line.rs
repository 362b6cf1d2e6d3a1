//! Line entity: a styled polyline.

use super::{EntityId, EntityMeta, EntityTrait, LineCap, LineJoin, Style};
use crate::geometry::{self, bounds_of_points};
use crate::selection::{Handle, HandleKind};
use kurbo::{BezPath, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A polyline with at least two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineEntity {
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Vertices in drawing order.
    pub points: Vec<Point>,
    pub style: Style,
    #[serde(default)]
    pub cap: LineCap,
    #[serde(default)]
    pub join: LineJoin,
}

impl LineEntity {
    /// Create a straight two-point line.
    pub fn new(start: Point, end: Point, style: Style) -> Self {
        Self::from_points(vec![start, end], style)
    }

    /// Create a polyline from multiple points.
    pub fn from_points(points: Vec<Point>, style: Style) -> Self {
        Self {
            meta: EntityMeta::new(),
            points,
            style,
            cap: LineCap::default(),
            join: LineJoin::default(),
        }
    }

    /// Reconstruct a line with a specific ID (for storage and tests).
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.meta.id = id;
        self
    }

    pub fn start(&self) -> Point {
        self.points.first().copied().unwrap_or(Point::ZERO)
    }

    pub fn end(&self) -> Point {
        self.points.last().copied().unwrap_or(Point::ZERO)
    }

    /// Total length of all segments.
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| geometry::distance(w[0], w[1]))
            .sum()
    }

    /// Midpoint of the first segment.
    pub fn midpoint(&self) -> Point {
        self.start().midpoint(self.points.get(1).copied().unwrap_or(self.start()))
    }

    /// Whether the line has enough distinct points to be drawn.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 2
            && self.points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Path representation for rendering.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        if let Some((first, rest)) = self.points.split_first() {
            path.move_to(*first);
            for p in rest {
                path.line_to(*p);
            }
        }
        path
    }
}

impl EntityTrait for LineEntity {
    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn bounds(&self) -> Rect {
        bounds_of_points(&self.points).unwrap_or(Rect::ZERO)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let reach = tolerance + self.style.stroke_width / 2.0;
        geometry::point_to_polyline_dist(point, &self.points) <= reach
    }

    fn intersects_rect(&self, rect: Rect) -> bool {
        geometry::polyline_intersects_rect(&self.points, rect)
    }

    fn defining_points(&self) -> Vec<Point> {
        self.points.clone()
    }

    fn snap_points(&self) -> Vec<Point> {
        self.points.clone()
    }

    fn translate(&mut self, delta: Vec2) {
        for p in &mut self.points {
            *p += delta;
        }
    }

    fn handles(&self) -> Vec<Handle> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| Handle::new(*p, HandleKind::Vertex(i)))
            .collect()
    }

    fn move_handle(&mut self, kind: HandleKind, to: Point) -> bool {
        match kind {
            HandleKind::Vertex(i) if i < self.points.len() => {
                self.points[i] = to;
                true
            }
            _ => false,
        }
    }
}
