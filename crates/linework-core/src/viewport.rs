//! Pan/zoom view onto a document.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;

/// The view transform between screen pixels and document units.
///
/// Lives in the session, never in the document: panning and zooming are not
/// undoable and are not saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Screen position of the document origin.
    pub offset: Vec2,
    /// Screen pixels per document unit.
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document to screen.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Screen to document.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    /// Screen-space rectangle in document units.
    pub fn screen_rect_to_world(&self, rect: Rect) -> Rect {
        Rect::from_points(self.screen_to_world(rect.origin()), self.screen_to_world(Point::new(rect.x1, rect.y1)))
    }

    /// A distance in screen pixels expressed in document units.
    pub fn screen_to_world_distance(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom by `factor`, keeping `screen_point` over the same document point.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;
        let drift = screen_point - self.world_to_screen(world_point);
        self.offset += drift;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Show `bounds` centred in a view of `size`, leaving `padding` pixels.
    pub fn fit(&mut self, bounds: Rect, size: Size, padding: f64) {
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            self.zoom = 1.0;
            self.offset = Point::new(size.width / 2.0, size.height / 2.0) - bounds.center();
            return;
        }
        let available = Size::new(
            (size.width - padding * 2.0).max(1.0),
            (size.height - padding * 2.0).max(1.0),
        );
        let zoom = (available.width / bounds.width()).min(available.height / bounds.height());
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        let centre = bounds.center();
        self.offset = Vec2::new(
            size.width / 2.0 - centre.x * self.zoom,
            size.height / 2.0 - centre.y * self.zoom,
        );
    }
}
