//! Geometry kernel: distances, intersections and containment tests.
//!
//! Every function here is pure. Tolerance comparisons go through [`approx_eq`]
//! rather than exact float equality.

use kurbo::{Affine, Point, Rect, Vec2};

/// Tolerance used for coordinate equality.
pub const EPSILON: f64 = 1e-9;

/// Compare two scalars within [`EPSILON`].
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

/// Compare two points component-wise within [`EPSILON`].
pub fn points_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    (b - a).hypot()
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    distance(point, proj)
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => distance(point, *only),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Test if two line segments (a-b) and (c-d) intersect, touching included.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let cross = |o: Point, p: Point, q: Point| -> f64 {
        (p.x - o.x) * (q.y - o.y) - (p.y - o.y) * (q.x - o.x)
    };
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    // Collinear cases: check if an endpoint lies on the other segment
    let on_segment = |p: Point, q: Point, r: Point| -> bool {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    };
    (d1.abs() < 1e-10 && on_segment(c, d, a))
        || (d2.abs() < 1e-10 && on_segment(c, d, b))
        || (d3.abs() < 1e-10 && on_segment(a, b, c))
        || (d4.abs() < 1e-10 && on_segment(a, b, d))
}

/// Inclusive point-in-rectangle test.
///
/// `kurbo::Rect::contains` excludes the far edges; marquee selection needs
/// points on any edge to count.
pub fn point_in_rect(point: Point, rect: Rect) -> bool {
    let r = rect.abs();
    point.x >= r.x0 && point.x <= r.x1 && point.y >= r.y0 && point.y <= r.y1
}

/// The four edges of a rectangle, clockwise from the top-left corner.
pub fn rect_edges(rect: Rect) -> [(Point, Point); 4] {
    let r = rect.abs();
    let tl = Point::new(r.x0, r.y0);
    let tr = Point::new(r.x1, r.y0);
    let br = Point::new(r.x1, r.y1);
    let bl = Point::new(r.x0, r.y1);
    [(tl, tr), (tr, br), (br, bl), (bl, tl)]
}

/// Test whether a segment touches a rectangle: either endpoint inside or
/// crossing any edge.
pub fn segment_intersects_rect(a: Point, b: Point, rect: Rect) -> bool {
    if point_in_rect(a, rect) || point_in_rect(b, rect) {
        return true;
    }
    rect_edges(rect)
        .iter()
        .any(|&(c, d)| segments_intersect(a, b, c, d))
}

/// Test if any segment of a polyline intersects or lies inside a rectangle.
pub fn polyline_intersects_rect(points: &[Point], rect: Rect) -> bool {
    if points.iter().any(|p| point_in_rect(*p, rect)) {
        return true;
    }
    points
        .windows(2)
        .any(|w| segment_intersects_rect(w[0], w[1], rect))
}

/// Test whether a closed polygon touches a rectangle: a vertex inside the
/// rectangle, an edge crossing, or the rectangle fully inside the polygon.
pub fn polygon_intersects_rect(polygon: &[Point], rect: Rect) -> bool {
    if polygon.is_empty() {
        return false;
    }
    let mut closed = polygon.to_vec();
    closed.push(polygon[0]);
    if polyline_intersects_rect(&closed, rect) {
        return true;
    }
    point_in_polygon(rect.abs().center(), polygon)
}

/// Even-odd point-in-polygon test.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Corners of `local` rotated by `degrees` about `pivot`, clockwise from the
/// top-left corner.
pub fn rotated_rect_corners(local: Rect, pivot: Point, degrees: f64) -> [Point; 4] {
    let rot = Affine::rotate_about(degrees.to_radians(), pivot);
    let r = local.abs();
    [
        rot * Point::new(r.x0, r.y0),
        rot * Point::new(r.x1, r.y0),
        rot * Point::new(r.x1, r.y1),
        rot * Point::new(r.x0, r.y1),
    ]
}

/// Test whether `point` lies within `tolerance` of the rectangle `local`
/// rotated by `degrees` about `pivot`.
pub fn rotated_box_contains(local: Rect, pivot: Point, degrees: f64, point: Point, tolerance: f64) -> bool {
    // Bring the point into the box's unrotated frame instead of rotating the box.
    let unrotate = Affine::rotate_about(-degrees.to_radians(), pivot);
    let p = unrotate * point;
    point_in_rect(p, local.abs().inflate(tolerance, tolerance))
}

/// Axis-aligned bounds of a set of points.
pub fn bounds_of_points(points: &[Point]) -> Option<Rect> {
    let first = points.first()?;
    let init = Rect::from_points(*first, *first);
    Some(points[1..].iter().fold(init, |r, p| r.union_pt(*p)))
}

/// Unit vector and length of the segment a→b; zero vector for degenerate segments.
pub fn unit(a: Point, b: Point) -> (Vec2, f64) {
    let v = b - a;
    let len = v.hypot();
    if len <= 0.0 {
        (Vec2::ZERO, 0.0)
    } else {
        (v / len, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!(approx_eq(point_to_segment_dist(Point::new(5.0, 3.0), a, b), 3.0));
        // Beyond the end the distance is to the endpoint
        assert!(approx_eq(point_to_segment_dist(Point::new(13.0, 4.0), a, b), 5.0));
        // Degenerate segment
        assert!(approx_eq(point_to_segment_dist(Point::new(3.0, 4.0), a, a), 5.0));
    }

    #[test]
    fn test_polyline_distance() {
        let pts = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        assert!(approx_eq(point_to_polyline_dist(Point::new(12.0, 5.0), &pts), 2.0));
        assert_eq!(point_to_polyline_dist(Point::ZERO, &[]), f64::INFINITY);
    }

    #[test]
    fn test_segments_intersect() {
        let p = Point::new;
        assert!(segments_intersect(p(0.0, 0.0), p(10.0, 10.0), p(0.0, 10.0), p(10.0, 0.0)));
        assert!(!segments_intersect(p(0.0, 0.0), p(1.0, 1.0), p(5.0, 0.0), p(6.0, 1.0)));
        // Touching at an endpoint counts
        assert!(segments_intersect(p(0.0, 0.0), p(5.0, 0.0), p(5.0, 0.0), p(5.0, 5.0)));
    }

    #[test]
    fn test_segment_crossing_rect() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        // Both endpoints outside but crossing through
        assert!(segment_intersects_rect(Point::new(-5.0, 5.0), Point::new(15.0, 5.0), rect));
        assert!(!segment_intersects_rect(Point::new(-5.0, -5.0), Point::new(-1.0, 20.0), rect));
    }

    #[test]
    fn test_point_in_rect_includes_edges() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(point_in_rect(Point::new(10.0, 10.0), rect));
        assert!(!point_in_rect(Point::new(10.1, 10.0), rect));
    }

    #[test]
    fn test_rotated_box() {
        let local = Rect::new(-10.0, -2.0, 10.0, 2.0);
        let pivot = Point::ZERO;
        assert!(rotated_box_contains(local, pivot, 0.0, Point::new(9.0, 0.0), 0.0));
        assert!(!rotated_box_contains(local, pivot, 90.0, Point::new(9.0, 0.0), 0.0));
        assert!(rotated_box_contains(local, pivot, 90.0, Point::new(0.0, 9.0), 0.0));
    }

    #[test]
    fn test_polygon_contains_rect() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        // Marquee entirely inside the polygon still intersects it
        assert!(polygon_intersects_rect(&square, Rect::new(40.0, 40.0, 60.0, 60.0)));
        assert!(!polygon_intersects_rect(&square, Rect::new(140.0, 40.0, 160.0, 60.0)));
    }

    #[test]
    fn test_bounds_of_points() {
        let b = bounds_of_points(&[Point::new(3.0, -1.0), Point::new(-2.0, 4.0)]).unwrap();
        assert_eq!(b, Rect::new(-2.0, -1.0, 3.0, 4.0));
        assert!(bounds_of_points(&[]).is_none());
    }
}
