//! Snap functionality: endpoints, cardinal directions and the grid.
//!
//! [`snap`] is a pure function of the candidate point, the document and the
//! configuration. Priority is endpoint, then cardinal, then grid.

use crate::document::Document;
use crate::entities::EntityId;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Default endpoint snap radius in document units.
pub const DEFAULT_ENDPOINT_RADIUS: f64 = 8.0;

/// Angle increment for cardinal snapping in degrees.
pub const CARDINAL_INCREMENT: f64 = 45.0;

/// What a snapped point was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapKind {
    /// Point was left unchanged.
    #[default]
    None,
    /// Nearest grid intersection.
    Grid,
    /// Constrained to one of eight directions from the anchor.
    Cardinal,
    /// An existing entity's endpoint or anchor point, or a selection handle.
    Endpoint,
}

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    pub kind: SnapKind,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self { point, kind: SnapKind::None }
    }

    pub fn is_snapped(&self) -> bool {
        self.kind != SnapKind::None
    }
}

/// Snap radii and toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// How close a point must be to an endpoint to attach to it.
    pub endpoint_radius: f64,
    /// How close a grid intersection must be; `None` always snaps.
    pub grid_radius: Option<f64>,
    /// Constrain to eight directions when an anchor is given.
    pub cardinal: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            endpoint_radius: DEFAULT_ENDPOINT_RADIUS,
            grid_radius: None,
            cardinal: false,
        }
    }
}

/// Per-call snapping context.
#[derive(Debug, Clone, Default)]
pub struct SnapContext {
    /// Fixed point the candidate is dragged from (line start, vertex neighbour).
    pub anchor: Option<Point>,
    /// Entities whose points must not attract the candidate, usually the ones
    /// being edited.
    pub exclude: Vec<EntityId>,
    /// Keep the result inside this rectangle.
    pub bounds: Option<Rect>,
    /// Extra targets that attract like endpoints, usually the handles of
    /// selected entities.
    pub handles: Vec<Point>,
}

impl SnapContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchor(mut self, anchor: Point) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.exclude.extend(ids);
        self
    }

    pub fn within(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_handles(mut self, handles: impl IntoIterator<Item = Point>) -> Self {
        self.handles.extend(handles);
        self
    }
}

/// Snap an angle to the nearest increment.
/// Returns the snapped angle in degrees (0-360).
pub fn snap_angle(angle_degrees: f64, increment: f64) -> f64 {
    let snapped = (angle_degrees / increment).round() * increment;
    snapped.rem_euclid(360.0)
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, spacing: f64) -> Point {
    if spacing <= 0.0 || !spacing.is_finite() {
        return point;
    }
    Point::new(
        (point.x / spacing).round() * spacing,
        (point.y / spacing).round() * spacing,
    )
}

/// Direction index 0..8 of `point` seen from `anchor`, counted in 45°
/// steps clockwise from east (y grows downward).
fn direction(anchor: Point, point: Point) -> usize {
    let v = point - anchor;
    let angle = snap_angle(v.y.atan2(v.x).to_degrees(), CARDINAL_INCREMENT);
    ((angle / CARDINAL_INCREMENT).round() as usize) % 8
}

/// Constrain `point` to the nearest of the eight directions from `anchor`.
///
/// Horizontal and vertical directions keep the free coordinate; diagonals use
/// the smaller of the two offsets so the result stays on the 45° ray.
pub fn snap_cardinal(anchor: Point, point: Point) -> Point {
    cardinal_with(anchor, point, |m| m)
}

/// Cardinal snap whose magnitude is also fixed to the grid.
///
/// Axis directions land on the nearest grid line crossing the ray; diagonals
/// round the per-axis offset to whole grid steps.
pub fn snap_cardinal_to_grid(anchor: Point, point: Point, spacing: f64) -> Point {
    if spacing <= 0.0 || !spacing.is_finite() {
        return snap_cardinal(anchor, point);
    }
    let axis = |v: f64| (v / spacing).round() * spacing;
    match direction(anchor, point) {
        0 | 4 => Point::new(axis(point.x), anchor.y),
        2 | 6 => Point::new(anchor.x, axis(point.y)),
        _ => cardinal_with(anchor, point, |m| (m / spacing).round() * spacing),
    }
}

fn cardinal_with(anchor: Point, point: Point, magnitude: impl Fn(f64) -> f64) -> Point {
    let dx = point.x - anchor.x;
    let dy = point.y - anchor.y;
    if dx == 0.0 && dy == 0.0 {
        return point;
    }
    match direction(anchor, point) {
        0 | 4 => Point::new(point.x, anchor.y),
        2 | 6 => Point::new(anchor.x, point.y),
        _ => {
            let m = magnitude(dx.abs().min(dy.abs()));
            Point::new(anchor.x + m.copysign(dx), anchor.y + m.copysign(dy))
        }
    }
}

/// Nearest snap point of a visible, non-excluded entity within `radius`.
///
/// Ties keep the entity painted first so results do not depend on map order.
pub fn nearest_endpoint(point: Point, doc: &Document, radius: f64, exclude: &[EntityId]) -> Option<Point> {
    let candidates = doc
        .all()
        .filter(|e| e.is_visible() && !exclude.contains(&e.id()))
        .flat_map(|e| e.snap_points());
    nearest_within(point, candidates, radius)
}

fn nearest_within(point: Point, candidates: impl IntoIterator<Item = Point>, radius: f64) -> Option<Point> {
    let mut best: Option<(f64, Point)> = None;
    let limit = radius * radius;
    for candidate in candidates {
        let d = (candidate - point).hypot2();
        if d <= limit && best.is_none_or(|(bd, _)| d < bd) {
            best = Some((d, candidate));
        }
    }
    best.map(|(_, p)| p)
}

/// Snap `point` against the document.
pub fn snap(point: Point, doc: &Document, config: &SnapConfig, context: &SnapContext) -> SnapResult {
    let endpoint = nearest_endpoint(point, doc, config.endpoint_radius, &context.exclude);
    let handle = nearest_within(point, context.handles.iter().copied(), config.endpoint_radius);
    let closest = match (endpoint, handle) {
        (Some(e), Some(h)) if (h - point).hypot2() < (e - point).hypot2() => Some(h),
        (Some(e), _) => Some(e),
        (None, h) => h,
    };
    if let Some(p) = closest {
        return SnapResult { point: p, kind: SnapKind::Endpoint };
    }

    let grid = doc.grid();
    let grid_on = grid.snaps();

    if config.cardinal {
        if let Some(anchor) = context.anchor {
            if anchor != point {
                let p = if grid_on {
                    snap_cardinal_to_grid(anchor, point, grid.spacing)
                } else {
                    snap_cardinal(anchor, point)
                };
                return clamp(SnapResult { point: p, kind: SnapKind::Cardinal }, context, grid_on.then_some(grid.spacing));
            }
        }
    }

    if grid_on {
        let p = snap_to_grid(point, grid.spacing);
        let in_reach = config.grid_radius.is_none_or(|r| (p - point).hypot() <= r);
        if in_reach {
            return clamp(SnapResult { point: p, kind: SnapKind::Grid }, context, Some(grid.spacing));
        }
    }

    clamp(SnapResult::none(point), context, None)
}

/// Keep a result inside the context bounds, staying on the grid when one
/// applies. Bounds narrower than a grid step leave no grid point to land
/// on; the point is then clamped freely and reported as not snapped.
fn clamp(mut result: SnapResult, context: &SnapContext, spacing: Option<f64>) -> SnapResult {
    let Some(bounds) = context.bounds else {
        return result;
    };
    let b = bounds.abs();
    let mut off_grid = false;
    let mut fit = |v: f64, lo: f64, hi: f64| -> f64 {
        let on_grid = match spacing {
            Some(s) if v < lo => (lo / s).ceil() * s,
            Some(s) if v > hi => (hi / s).floor() * s,
            _ => return v.clamp(lo, hi),
        };
        if (lo..=hi).contains(&on_grid) {
            on_grid
        } else {
            off_grid = true;
            v.clamp(lo, hi)
        }
    };
    let x = fit(result.point.x, b.x0, b.x1);
    let y = fit(result.point.y, b.y0, b.y1);
    result.point = Point::new(x, y);
    if off_grid {
        result.kind = SnapKind::None;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::document::GridConfig;
    use crate::entities::{Entity, LineEntity, Style};

    fn grid_doc(spacing: f64) -> Document {
        let mut doc = Document::new();
        doc.set_grid(GridConfig { spacing, ..GridConfig::default() });
        doc
    }

    fn add_line(doc: &mut Document, a: Point, b: Point) -> EntityId {
        let entity: Entity = LineEntity::new(a, b, Style::default()).into();
        let id = entity.id();
        Command::add(vec![entity]).apply(doc).unwrap();
        id
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(Point::new(97.0, 3.0), 10.0), Point::new(100.0, 0.0));
        assert_eq!(snap_to_grid(Point::new(-14.0, 26.0), 20.0), Point::new(-20.0, 20.0));
        assert_eq!(snap_to_grid(Point::new(3.0, 3.0), 0.0), Point::new(3.0, 3.0));
    }

    #[test]
    fn test_snap_angle() {
        assert_eq!(snap_angle(40.0, 45.0), 45.0);
        assert_eq!(snap_angle(-10.0, 45.0), 0.0);
        assert_eq!(snap_angle(350.0, 45.0), 0.0);
        assert_eq!(snap_angle(-100.0, 45.0), 270.0);
    }

    #[test]
    fn test_cardinal_axes_lock_one_coordinate() {
        let a = Point::new(10.0, 10.0);
        assert_eq!(snap_cardinal(a, Point::new(50.0, 14.0)), Point::new(50.0, 10.0));
        assert_eq!(snap_cardinal(a, Point::new(12.0, -30.0)), Point::new(10.0, -30.0));
    }

    #[test]
    fn test_cardinal_diagonal_uses_smaller_offset() {
        let a = Point::new(0.0, 0.0);
        assert_eq!(snap_cardinal(a, Point::new(30.0, -24.0)), Point::new(24.0, -24.0));
        assert_eq!(snap_cardinal(a, Point::new(-20.0, 25.0)), Point::new(-20.0, 20.0));
    }

    #[test]
    fn test_cardinal_with_grid_satisfies_both() {
        let a = Point::new(0.0, 0.0);
        let p = snap_cardinal_to_grid(a, Point::new(47.0, 43.0), 10.0);
        assert_eq!(p, Point::new(40.0, 40.0));
        let p = snap_cardinal_to_grid(a, Point::new(47.0, 3.0), 10.0);
        assert_eq!(p, Point::new(50.0, 0.0));
    }

    #[test]
    fn test_drag_endpoint_snaps_to_grid() {
        let mut doc = grid_doc(10.0);
        let id = add_line(&mut doc, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let context = SnapContext::new().excluding([id]);
        let result = snap(Point::new(97.0, 3.0), &doc, &SnapConfig::default(), &context);
        assert_eq!(result.point, Point::new(100.0, 0.0));
        assert_eq!(result.kind, SnapKind::Grid);
    }

    #[test]
    fn test_endpoint_beats_grid() {
        let mut doc = grid_doc(10.0);
        add_line(&mut doc, Point::new(0.0, 0.0), Point::new(103.0, 2.0));
        let result = snap(Point::new(101.0, 1.0), &doc, &SnapConfig::default(), &SnapContext::new());
        assert_eq!(result.kind, SnapKind::Endpoint);
        assert_eq!(result.point, Point::new(103.0, 2.0));
    }

    #[test]
    fn test_grid_radius_limits_reach() {
        let doc = grid_doc(100.0);
        let config = SnapConfig { grid_radius: Some(5.0), ..SnapConfig::default() };
        let result = snap(Point::new(40.0, 40.0), &doc, &config, &SnapContext::new());
        assert_eq!(result, SnapResult::none(Point::new(40.0, 40.0)));
    }

    #[test]
    fn test_grid_disabled() {
        let mut doc = Document::new();
        doc.set_grid(GridConfig { snap_enabled: false, ..GridConfig::default() });
        let result = snap(Point::new(13.0, 17.0), &doc, &SnapConfig::default(), &SnapContext::new());
        assert!(!result.is_snapped());
    }

    #[test]
    fn test_cardinal_needs_anchor() {
        let mut doc = Document::new();
        doc.set_grid(GridConfig { snap_enabled: false, ..GridConfig::default() });
        let config = SnapConfig { cardinal: true, ..SnapConfig::default() };
        let free = snap(Point::new(30.0, 4.0), &doc, &config, &SnapContext::new());
        assert_eq!(free.kind, SnapKind::None);
        let anchored = snap(Point::new(30.0, 4.0), &doc, &config, &SnapContext::new().with_anchor(Point::ZERO));
        assert_eq!(anchored, SnapResult { point: Point::new(30.0, 0.0), kind: SnapKind::Cardinal });
    }

    #[test]
    fn test_clamped_to_bounds_on_grid() {
        let doc = grid_doc(40.0);
        let context = SnapContext::new().within(Rect::new(0.0, 0.0, 590.0, 600.0));
        let result = snap(Point::new(595.0, -30.0), &doc, &SnapConfig::default(), &context);
        assert_eq!(result.point, Point::new(560.0, 0.0));
    }

    #[test]
    fn test_bounds_narrower_than_grid() {
        let doc = grid_doc(40.0);
        let context = SnapContext::new().within(Rect::new(10.0, 10.0, 30.0, 30.0));
        let result = snap(Point::new(50.0, 20.0), &doc, &SnapConfig::default(), &context);
        assert_eq!(result, SnapResult::none(Point::new(30.0, 30.0)));
    }

    #[test]
    fn test_selection_handles_attract() {
        let doc = grid_doc(10.0);
        let handle = Point::new(43.0, 57.0);
        let context = SnapContext::new().with_handles([handle]);
        let result = snap(Point::new(45.0, 55.0), &doc, &SnapConfig::default(), &context);
        assert_eq!(result, SnapResult { point: handle, kind: SnapKind::Endpoint });
        let far = snap(Point::new(80.0, 80.0), &doc, &SnapConfig::default(), &context);
        assert_eq!(far.kind, SnapKind::Grid);
    }

    #[test]
    fn test_snap_is_deterministic() {
        let mut doc = grid_doc(10.0);
        add_line(&mut doc, Point::new(0.0, 0.0), Point::new(50.0, 50.0));
        add_line(&mut doc, Point::new(50.0, 50.0), Point::new(90.0, 10.0));
        let config = SnapConfig::default();
        let context = SnapContext::new();
        let first = snap(Point::new(48.0, 52.0), &doc, &config, &context);
        for _ in 0..10 {
            assert_eq!(snap(Point::new(48.0, 52.0), &doc, &config, &context), first);
        }
    }
}
