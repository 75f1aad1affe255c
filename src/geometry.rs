//! Polygon geometry primitives (component C1).
//!
//! `polygon_area` is computed with a y-down trapezoid formula, so a ring
//! that looks counter-clockwise in math convention comes out negative here.
//! Every other primitive in this module is convention-agnostic.

use geo::{BoundingRect, ConvexHull as GeoConvexHull, LineString};

/// Absolute tolerance used by containment tests (`point_in_polygon`, touch
/// detection).
pub const CONTAINMENT_TOLERANCE: f64 = 1e-10;
/// Absolute tolerance used by `is_rectangle`.
pub const RECTANGLE_TOLERANCE: f64 = 1e-6;

/// Default scale factor used when interfacing with the clipping library.
pub const CLIPPER_SCALE: f64 = 10_000_000.0;
/// Default curve tolerance when approximating curves.
pub const CURVE_TOLERANCE: f64 = 0.3;

/// A single 2D point. `exact` marks a vertex that came from the original
/// source geometry (as opposed to curve flattening) and gates line merging.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub exact: bool,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, exact: false }
    }

    pub fn exact(x: f64, y: f64) -> Self {
        Self { x, y, exact: true }
    }
}

/// Shared absolute-tolerance comparator.
pub fn almost_equal(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

fn almost_equal_point(a: &Point, b: &Point, tol: f64) -> bool {
    almost_equal(a.x, b.x, tol) && almost_equal(a.y, b.y, tol)
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

fn to_linestring(points: &[Point]) -> LineString<f64> {
    points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>().into()
}

/// Axis-aligned bounds of a ring. `None` for fewer than 3 points.
pub fn bounds(points: &[Point]) -> Option<Bounds> {
    if points.len() < 3 {
        return None;
    }
    let ls = to_linestring(points);
    let rect = ls.bounding_rect()?;
    Some(Bounds {
        x: rect.min().x,
        y: rect.min().y,
        width: rect.width(),
        height: rect.height(),
    })
}

/// Bounds across several rings (used for a polygon plus its children, or a
/// whole part made of disjoint rings).
pub fn bounds_many<'a, I: IntoIterator<Item = &'a [Point]>>(rings: I) -> Option<Bounds> {
    let mut acc: Option<Bounds> = None;
    for ring in rings {
        if let Some(b) = bounds(ring) {
            acc = Some(match acc {
                None => b,
                Some(a) => {
                    let x0 = a.x.min(b.x);
                    let y0 = a.y.min(b.y);
                    let x1 = (a.x + a.width).max(b.x + b.width);
                    let y1 = (a.y + a.height).max(b.y + b.height);
                    Bounds { x: x0, y: y0, width: x1 - x0, height: y1 - y0 }
                }
            });
        }
    }
    acc
}

/// Signed area via the y-down trapezoid formula (see module docs). A
/// degenerate ring (< 3 points) has area 0.
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        area += (points[j].x + points[i].x) * (points[j].y - points[i].y);
        j = i;
    }
    0.5 * area
}

/// Rotate a ring by `angle_deg` degrees around the origin. Preserves the
/// `exact` flag of every vertex.
pub fn rotate_polygon(points: &[Point], angle_deg: f64) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }
    let rad = angle_deg.to_radians();
    let (sin, cos) = rad.sin_cos();
    points
        .iter()
        .map(|p| Point {
            x: p.x * cos - p.y * sin,
            y: p.x * sin + p.y * cos,
            exact: p.exact,
        })
        .collect()
}

/// Translate a ring by `(dx, dy)`. Preserves the `exact` flag.
pub fn translate_polygon(points: &[Point], dx: f64, dy: f64) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point { x: p.x + dx, y: p.y + dy, exact: p.exact })
        .collect()
}

/// Containment classification for `point_in_polygon`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Inside,
    Outside,
    OnBoundary,
}

/// Ray-casting point-in-polygon test with boundary detection, tolerant to
/// `CONTAINMENT_TOLERANCE`.
pub fn point_in_polygon_full(poly: &[Point], x: f64, y: f64) -> Containment {
    if poly.len() < 3 {
        return Containment::Outside;
    }
    let mut inside = false;
    let n = poly.len();
    for i in 0..n {
        let j = if i == 0 { n - 1 } else { i - 1 };
        let (xi, yi) = (poly[i].x, poly[i].y);
        let (xj, yj) = (poly[j].x, poly[j].y);

        if point_on_segment(x, y, xi, yi, xj, yj, CONTAINMENT_TOLERANCE) {
            return Containment::OnBoundary;
        }

        let intersects = (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi;
        if intersects {
            inside = !inside;
        }
    }
    if inside { Containment::Inside } else { Containment::Outside }
}

/// Boolean convenience wrapper treating the boundary as inside, matching
/// how the placer uses containment (a point exactly on an NFP edge is a
/// valid placement, not a rejection).
pub fn point_in_polygon(poly: &[Point], x: f64, y: f64) -> bool {
    !matches!(point_in_polygon_full(poly, x, y), Containment::Outside)
}

fn point_on_segment(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64, tol: f64) -> bool {
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross.abs() > tol * ((bx - ax).hypot(by - ay)).max(1.0) {
        return false;
    }
    let dot = (px - ax) * (bx - ax) + (py - ay) * (by - ay);
    if dot < -tol {
        return false;
    }
    let len2 = (bx - ax).powi(2) + (by - ay).powi(2);
    dot <= len2 + tol
}

/// AABB-guarded segment intersection test between two rings, each
/// pre-translated by its own placement offset.
pub fn polygons_intersect(a: &[Point], b: &[Point], ax: f64, ay: f64, bx: f64, by: f64) -> bool {
    let Some(ba) = bounds(a) else { return false };
    let Some(bb) = bounds(b) else { return false };
    let (ba_x, ba_y) = (ba.x + ax, ba.y + ay);
    let (bb_x, bb_y) = (bb.x + bx, bb.y + by);
    if ba_x + ba.width < bb_x || bb_x + bb.width < ba_x || ba_y + ba.height < bb_y || bb_y + bb.height < ba_y {
        return false;
    }

    for i in 0..a.len() {
        let a1 = (a[i].x + ax, a[i].y + ay);
        let a2 = (a[(i + 1) % a.len()].x + ax, a[(i + 1) % a.len()].y + ay);
        for j in 0..b.len() {
            let b1 = (b[j].x + bx, b[j].y + by);
            let b2 = (b[(j + 1) % b.len()].x + bx, b[(j + 1) % b.len()].y + by);
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    // fully-nested case: a vertex of b inside a (or vice versa), no edge crossing.
    // Strictly inside only — two parts sitting flush along a shared edge put a
    // reference vertex exactly on the neighbor's boundary, and the spec's "does
    // not strictly overlap" (§8) permits that contact.
    let a_shifted = translate_polygon(a, ax, ay);
    let b_shifted = translate_polygon(b, bx, by);
    if let Some(p) = b_shifted.first() {
        if point_in_polygon_full(&a_shifted, p.x, p.y) == Containment::Inside {
            return true;
        }
    }
    if let Some(p) = a_shifted.first() {
        if point_in_polygon_full(&b_shifted, p.x, p.y) == Containment::Inside {
            return true;
        }
    }
    false
}

fn segments_intersect(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), p4: (f64, f64)) -> bool {
    fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    }
    let d1 = cross(p3, p4, p1);
    let d2 = cross(p3, p4, p2);
    let d3 = cross(p1, p2, p3);
    let d4 = cross(p1, p2, p4);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Does `outer` (placed at `outer_off`) fully contain `inner` (placed at
/// `inner_off`)? Used to detect the "hole placement" exception to overlap
/// rejection.
pub fn polygon_contains_polygon(
    outer: &[Point],
    inner: &[Point],
    outer_x: f64,
    outer_y: f64,
    inner_x: f64,
    inner_y: f64,
) -> bool {
    let shifted_outer = translate_polygon(outer, outer_x, outer_y);
    inner.iter().all(|p| point_in_polygon(&shifted_outer, p.x + inner_x, p.y + inner_y))
}

/// Four points, pairwise axis-aligned edges within `tol`.
pub fn is_rectangle(points: &[Point], tol: f64) -> bool {
    if points.len() != 4 {
        return false;
    }
    let Some(b) = bounds(points) else { return false };
    points.iter().all(|p| {
        (almost_equal(p.x, b.x, tol) || almost_equal(p.x, b.x + b.width, tol))
            && (almost_equal(p.y, b.y, tol) || almost_equal(p.y, b.y + b.height, tol))
    })
}

/// Convex hull via `geo`'s static hull routine. Empty/degenerate input is
/// returned unchanged.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let ls = to_linestring(points);
    let hull = ls.convex_hull();
    hull.exterior().points().map(|c| Point::new(c.x(), c.y())).collect()
}

/// Euclidean distance between two points.
pub fn point_distance(a: &Point, b: &Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Distance from point `p` to the segment `(a, b)`.
pub fn segment_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 < f64::EPSILON {
        return point_distance(p, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * dx, a.y + t * dy);
    point_distance(p, &proj)
}

/// Maximum distance `b`'s reference vertex can travel along `direction`
/// before `b` (translated along that direction) first touches `a`, i.e.
/// the standard "ray vs. polygon edges" projection used by the sliding
/// NFP search and by hole-placement gravity.
pub fn polygon_projection_distance(a: &[Point], b: &[Point], direction: Point) -> Option<f64> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }
    let mut min_dist: Option<f64> = None;
    for p in b {
        for ai in 0..a.len() {
            let a1 = &a[ai];
            let a2 = &a[(ai + 1) % a.len()];
            if let Some(d) = ray_edge_distance(p, &direction, a1, a2) {
                if d >= -1e-9 {
                    min_dist = Some(min_dist.map_or(d, |m: f64| m.min(d)));
                }
            }
        }
    }
    min_dist
}

fn ray_edge_distance(origin: &Point, dir: &Point, a: &Point, b: &Point) -> Option<f64> {
    // Solve origin + t*dir = a + s*(b - a), 0 <= s <= 1, t >= 0.
    let ex = b.x - a.x;
    let ey = b.y - a.y;
    let denom = dir.x * ey - dir.y * ex;
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = ((a.x - origin.x) * ey - (a.y - origin.y) * ex) / denom;
    let s = ((a.x - origin.x) * dir.y - (a.y - origin.y) * dir.x) / denom;
    if t >= 0.0 && (0.0..=1.0).contains(&s) { Some(t) } else { None }
}

/// Maximum distance polygon `b` can slide along `direction` while
/// remaining in contact with polygon `a`. A thin wrapper around
/// `polygon_projection_distance`; kept as a distinct name because callers
/// (hole placement, exact-NFP touch search) reason about it as a slide,
/// not a ray cast.
pub fn polygon_slide_distance(a: &[Point], b: &[Point], direction: Point) -> Option<f64> {
    polygon_projection_distance(a, b, direction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_of_square() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0), Point::new(0.0, 1.0)];
        assert_eq!(polygon_area(&pts), -1.0);
        let b = bounds(&pts).unwrap();
        assert_eq!(b.width, 1.0);
        assert_eq!(b.height, 1.0);
    }

    #[test]
    fn area_of_triangle_ccw() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)];
        assert!((polygon_area(&pts) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn area_magnitude_is_stable_under_rotation() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(4.0, 2.0), Point::new(0.0, 2.0)];
        let before = polygon_area(&pts).abs();
        for angle in [15.0, 90.0, 137.0, 270.0] {
            let rotated = rotate_polygon(&pts, angle);
            assert!((polygon_area(&rotated).abs() - before).abs() < 1e-9);
        }
    }

    #[test]
    fn rotate_round_trip() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(3.0, 0.0), Point::new(3.0, 1.0), Point::new(0.0, 1.0)];
        let there = rotate_polygon(&pts, 37.0);
        let back = rotate_polygon(&there, -37.0);
        for (p, q) in pts.iter().zip(back.iter()) {
            assert!(almost_equal_point(p, q, 1e-9));
        }
    }

    #[test]
    fn degenerate_polygon_has_no_bounds() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        assert_eq!(polygon_area(&pts), 0.0);
        assert!(bounds(&pts).is_none());
    }

    #[test]
    fn point_in_polygon_classifies_correctly() {
        let square = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(0.0, 10.0)];
        assert_eq!(point_in_polygon_full(&square, 5.0, 5.0), Containment::Inside);
        assert_eq!(point_in_polygon_full(&square, 15.0, 5.0), Containment::Outside);
        assert_eq!(point_in_polygon_full(&square, 0.0, 5.0), Containment::OnBoundary);
    }

    #[test]
    fn rectangle_detection() {
        let square = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(0.0, 10.0)];
        assert!(is_rectangle(&square, RECTANGLE_TOLERANCE));
        let not_square = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(1.0, 10.0)];
        assert!(!is_rectangle(&not_square, RECTANGLE_TOLERANCE));
    }

    #[test]
    fn convex_hull_of_square_is_square() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(0.0, 10.0)];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
    }

    #[test]
    fn polygons_intersect_detects_overlap() {
        let a = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(0.0, 10.0)];
        let b = a.clone();
        assert!(polygons_intersect(&a, &b, 0.0, 0.0, 5.0, 5.0));
        assert!(!polygons_intersect(&a, &b, 0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn polygons_sharing_only_an_edge_do_not_intersect() {
        // b placed flush against a's right edge: touching, not overlapping.
        let a = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(0.0, 10.0)];
        let b = a.clone();
        assert!(!polygons_intersect(&a, &b, 0.0, 0.0, 10.0, 0.0));
    }
}
