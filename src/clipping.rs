//! Polygon Boolean ops and Minkowski sum (component C2).
//!
//! This is modeled as a trait, `ClipEngine`, so the NFP engine never
//! talks to a concrete clipping library directly.
//! The production implementation, `ClipperEngine`, is backed by
//! `geo-clipper` (a safe wrapper around the Clipper polygon library) for
//! `union`/`difference`, and by a decomposition-based Minkowski sum built
//! on top of `geo`'s ear-clipping triangulation plus that same union —
//! the Clipper library itself has no Minkowski primitive exposed through
//! `geo-clipper`, so the sum of two possibly-concave polygons is obtained
//! by triangulating both (triangles are always convex), summing every
//! triangle pair with the textbook convex-convex merge-by-angle algorithm,
//! and unioning the results. This mirrors the approach CGAL documents for
//! decomposition-based Minkowski sums.

use crate::geometry::Point;
use geo::TriangulateEarcut;
use geo_clipper::Clipper as GeoClipperOps;
use geo_types::{Coord, LineString as GeoLineString, MultiPolygon, Polygon as GeoPolygon};

/// Even-odd vs. non-zero winding fill rule. The
/// `geo-clipper`-backed engine currently applies the library's default
/// (non-zero) for both variants; the enum is kept so call sites state
/// their intent and a future backend can honor it exactly (documented in
/// DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// A closed ring of points, the currency `ClipEngine` operates on. Rings
/// here are flat (no children) — hole handling happens one layer up in
/// `nfp.rs`, which flattens a `Polygon`'s children into sibling clip
/// inputs before calling into this module.
pub type Ring = Vec<Point>;

pub trait ClipEngine: Send + Sync {
    /// Union of all `polys` under `fill`.
    fn union(&self, polys: &[Ring], fill: FillRule) -> Vec<Ring>;
    /// `subject` minus `clip`, under `fill`.
    fn difference(&self, subject: &[Ring], clip: &[Ring], fill: FillRule) -> Vec<Ring>;
    /// `subject` ∩ `clip`, under `fill`. Used by the inner-NFP erosion
    /// routine to intersect successive translated copies
    /// of a container's outer ring.
    fn intersection(&self, subject: &[Ring], clip: &[Ring], fill: FillRule) -> Vec<Ring>;
    /// Minkowski sum `a ⊕ b`. Each returned ring is a candidate NFP
    /// component; the caller picks the one with the
    /// largest negative (clockwise, by the engine's area convention) area.
    fn minkowski_sum(&self, a: &[Point], b: &[Point]) -> Vec<Ring> {
        self.minkowski_sum_with_holes(a, &[], b)
    }
    /// Minkowski sum of `a` (an outer ring with interior `a_holes`) and
    /// `b`. `geo`'s earcut triangulator natively handles interior rings,
    /// so a holey A decomposes into the same triangle-pair merge as a
    /// simple A — holey containers get exact Minkowski treatment without
    /// a second concave-specific algorithm (see DESIGN.md).
    fn minkowski_sum_with_holes(&self, a: &[Point], a_holes: &[Ring], b: &[Point]) -> Vec<Ring> {
        let tri_a = triangulate_with_holes(a, a_holes);
        let tri_b = triangulate(b);
        if tri_a.is_empty() || tri_b.is_empty() {
            return Vec::new();
        }
        let mut parts: Vec<Ring> = Vec::with_capacity(tri_a.len() * tri_b.len());
        for ta in &tri_a {
            for tb in &tri_b {
                let sum = convex_minkowski_sum(ta, tb);
                if sum.len() >= 3 {
                    parts.push(sum);
                }
            }
        }
        if parts.is_empty() {
            return Vec::new();
        }
        self.union(&parts, FillRule::NonZero)
    }
}

/// Default production engine: `geo-clipper` for Boolean ops, decomposition
/// + the same library's union for Minkowski sum.
pub struct ClipperEngine {
    pub scale: f64,
}

impl ClipperEngine {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }
}

impl Default for ClipperEngine {
    fn default() -> Self {
        Self::new(crate::geometry::CLIPPER_SCALE)
    }
}

fn to_geo_polygon(points: &[Point]) -> GeoPolygon<f64> {
    let coords: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    GeoPolygon::new(GeoLineString(coords), vec![])
}

fn from_geo_polygon(poly: &GeoPolygon<f64>) -> Ring {
    poly.exterior().coords().map(|c| Point::new(c.x, c.y)).collect()
}

fn multi_from_rings(rings: &[Ring]) -> MultiPolygon<f64> {
    MultiPolygon(rings.iter().filter(|r| r.len() >= 3).map(|r| to_geo_polygon(r)).collect())
}

impl ClipEngine for ClipperEngine {
    fn union(&self, polys: &[Ring], _fill: FillRule) -> Vec<Ring> {
        let mut polys = polys.iter().filter(|p| p.len() >= 3);
        let Some(first) = polys.next() else { return Vec::new() };
        let mut acc = MultiPolygon(vec![to_geo_polygon(first)]);
        for p in polys {
            acc = acc.union(&to_geo_polygon(p), self.scale);
        }
        acc.0.iter().map(from_geo_polygon).collect()
    }

    fn difference(&self, subject: &[Ring], clip: &[Ring], _fill: FillRule) -> Vec<Ring> {
        let subject_mp = multi_from_rings(subject);
        let clip_mp = multi_from_rings(clip);
        if subject_mp.0.is_empty() {
            return Vec::new();
        }
        if clip_mp.0.is_empty() {
            return subject_mp.0.iter().map(from_geo_polygon).collect();
        }
        let result = subject_mp.difference(&clip_mp, self.scale);
        result.0.iter().map(from_geo_polygon).collect()
    }

    fn intersection(&self, subject: &[Ring], clip: &[Ring], _fill: FillRule) -> Vec<Ring> {
        let subject_mp = multi_from_rings(subject);
        let clip_mp = multi_from_rings(clip);
        if subject_mp.0.is_empty() || clip_mp.0.is_empty() {
            return Vec::new();
        }
        let result = subject_mp.intersection(&clip_mp, self.scale);
        result.0.iter().map(from_geo_polygon).collect()
    }
}

/// Ear-clipping triangulation via `geo`'s `TriangulateEarcut`. Each
/// returned ring has exactly 3 points, CCW-oriented (standard math
/// convention, independent of this crate's y-down `polygon_area` sign).
fn triangulate(points: &[Point]) -> Vec<Ring> {
    if points.len() < 3 {
        return Vec::new();
    }
    if points.len() == 3 {
        return vec![points.to_vec()];
    }
    let poly = to_geo_polygon(points);
    let triangles = poly.earcut_triangles();
    triangles
        .into_iter()
        .map(|t| vec![Point::new(t.0.x, t.0.y), Point::new(t.1.x, t.1.y), Point::new(t.2.x, t.2.y)])
        .collect()
}

/// As [`triangulate`], but `holes` are passed to `geo`'s earcut as
/// interior rings, so the returned triangles cover `a`'s solid area only
/// (the holes are excluded, not just ignored).
fn triangulate_with_holes(points: &[Point], holes: &[Ring]) -> Vec<Ring> {
    if points.len() < 3 {
        return Vec::new();
    }
    if holes.iter().all(|h| h.len() < 3) {
        return triangulate(points);
    }
    let interior: Vec<GeoLineString<f64>> = holes
        .iter()
        .filter(|h| h.len() >= 3)
        .map(|h| GeoLineString(h.iter().map(|p| Coord { x: p.x, y: p.y }).collect()))
        .collect();
    let exterior = GeoLineString(points.iter().map(|p| Coord { x: p.x, y: p.y }).collect());
    let poly = GeoPolygon::new(exterior, interior);
    let triangles = poly.earcut_triangles();
    triangles
        .into_iter()
        .map(|t| vec![Point::new(t.0.x, t.0.y), Point::new(t.1.x, t.1.y), Point::new(t.2.x, t.2.y)])
        .collect()
}

fn math_signed_area(points: &[Point]) -> f64 {
    let mut sum = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    0.5 * sum
}

/// Reorder `points` (assumed convex) to start at the lowest point
/// (lowest y, then lowest x) and wind CCW in standard math convention.
fn ccw_from_bottom(points: &[Point]) -> Vec<Point> {
    let mut pts = points.to_vec();
    if math_signed_area(&pts) < 0.0 {
        pts.reverse();
    }
    let (start_idx, _) = pts
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.y.partial_cmp(&b.y).unwrap().then(a.x.partial_cmp(&b.x).unwrap()))
        .unwrap();
    pts.rotate_left(start_idx);
    pts
}

fn edge_vector(ring: &[Point], i: usize) -> Point {
    let a = ring[i];
    let b = ring[(i + 1) % ring.len()];
    Point::new(b.x - a.x, b.y - a.y)
}

fn cross(a: Point, b: Point) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Sum of two convex polygons via the classic O(n+m) merge-by-polar-angle
/// algorithm: both rings are walked simultaneously from their bottom-most
/// vertex, at each step advancing whichever ring's next edge has the
/// smaller polar angle.
fn convex_minkowski_sum(a: &[Point], b: &[Point]) -> Ring {
    let a = ccw_from_bottom(a);
    let b = ccw_from_bottom(b);
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(n + m);
    let mut i = 0usize;
    let mut j = 0usize;
    let mut cur = Point::new(a[0].x + b[0].x, a[0].y + b[0].y);
    result.push(cur);

    while i < n || j < m {
        let ea = if i < n { Some(edge_vector(&a, i)) } else { None };
        let eb = if j < m { Some(edge_vector(&b, j)) } else { None };
        let take_a = match (ea, eb) {
            (Some(va), Some(vb)) => cross(va, vb) >= 0.0,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let v = if take_a { ea.unwrap() } else { eb.unwrap() };
        cur = Point::new(cur.x + v.x, cur.y + v.y);
        result.push(cur);
        if take_a {
            i += 1;
        } else {
            j += 1;
        }
    }
    result.pop(); // closes back onto the start point
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Vec<Point> {
        vec![Point::new(0.0, 0.0), Point::new(side, 0.0), Point::new(side, side), Point::new(0.0, side)]
    }

    #[test]
    fn convex_minkowski_sum_of_two_squares_is_a_larger_square() {
        let a = square(2.0);
        let b = square(1.0);
        let sum = convex_minkowski_sum(&a, &b);
        let area = math_signed_area(&sum).abs();
        assert!((area - 9.0).abs() < 1e-6, "expected (2+1)^2=9, got {area}");
    }

    #[test]
    fn triangulate_square_yields_two_triangles() {
        let sq = square(4.0);
        let tris = triangulate(&sq);
        assert_eq!(tris.len(), 2);
        for t in &tris {
            assert_eq!(t.len(), 3);
        }
    }

    #[test]
    fn engine_union_of_overlapping_squares() {
        let engine = ClipperEngine::default();
        let a = square(10.0);
        let b: Vec<Point> = a.iter().map(|p| Point::new(p.x + 5.0, p.y + 5.0)).collect();
        let result = engine.union(&[a, b], FillRule::NonZero);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn engine_difference_removes_overlap() {
        let engine = ClipperEngine::default();
        let a = square(10.0);
        let b: Vec<Point> = a.iter().map(|p| Point::new(p.x + 20.0, p.y + 20.0)).collect();
        let result = engine.difference(&[a.clone()], &[b], FillRule::NonZero);
        assert_eq!(result.len(), 1);
        let area = math_signed_area(&result[0]).abs();
        assert!((area - 100.0).abs() < 1e-6);
    }

    #[test]
    fn minkowski_sum_of_squares_is_nonempty() {
        let engine = ClipperEngine::default();
        let result = engine.minkowski_sum(&square(3.0), &square(1.0));
        assert!(!result.is_empty());
    }

    #[test]
    fn engine_intersection_of_overlapping_squares() {
        let engine = ClipperEngine::default();
        let a = square(10.0);
        let b: Vec<Point> = a.iter().map(|p| Point::new(p.x + 5.0, p.y + 5.0)).collect();
        let result = engine.intersection(&[a], &[b], FillRule::NonZero);
        assert_eq!(result.len(), 1);
        let area = math_signed_area(&result[0]).abs();
        assert!((area - 25.0).abs() < 1e-6, "expected 5x5 overlap, got {area}");
    }

    #[test]
    fn minkowski_sum_with_holes_excludes_hole_area() {
        let engine = ClipperEngine::default();
        let outer = square(10.0);
        let hole = vec![Point::new(3.0, 3.0), Point::new(7.0, 3.0), Point::new(7.0, 7.0), Point::new(3.0, 7.0)];
        let with_hole = engine.minkowski_sum_with_holes(&outer, &[hole], &square(1.0));
        let without_hole = engine.minkowski_sum(&outer, &square(1.0));
        let area_with: f64 = with_hole.iter().map(|r| math_signed_area(r).abs()).sum();
        let area_without: f64 = without_hole.iter().map(|r| math_signed_area(r).abs()).sum();
        assert!(area_with < area_without);
    }
}
