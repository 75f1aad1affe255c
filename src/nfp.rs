//! No-Fit-Polygon engine (component C3).
//!
//! Two distinct geometric operations live here, both keyed and cached the
//! same way:
//!
//! - `outer_nfp(A, B, inside)` — the locus of B's reference vertex such
//!   that B does not overlap A (`inside = false`), or such that B stays
//!   inside A's outer boundary (`inside = true`, ignoring A's own holes —
//!   those are handled one layer up by `inner_nfp`).
//! - `inner_nfp(A, B)` — the locus of positions where B fits entirely
//!   inside A, holes subtracted.
//!
//! Rather than dispatching holey/concave A to a dedicated orbital
//! algorithm, this implementation triangulates A *with* its holes via
//! `geo`'s earcut (which natively supports
//! interior rings) before the Minkowski merge, so one routine handles
//! concave and holey A uniformly (see DESIGN.md). Only the `inside = true`
//! case needs genuinely different math: Minkowski sum doesn't invert into
//! an erosion, so that path intersects successive translated copies of
//! A's outer ring instead (a standard NFP-theory identity).

use crate::clipping::{ClipEngine, FillRule, Ring};
use crate::geometry::{self, Point};
use crate::part::Polygon;

/// A single connected NFP region: an outer boundary plus any interior
/// holes (used by the inner-NFP hole-subtraction step).
#[derive(Debug, Clone, PartialEq)]
pub struct NfpShape {
    pub points: Vec<Point>,
    pub children: Vec<NfpShape>,
}

/// An NFP result: either one connected region, or several disconnected
/// ones (disconnected inner NFPs split around an obstruction).
#[derive(Debug, Clone)]
pub enum Nfp {
    Single(NfpShape),
    Many(Vec<NfpShape>),
}

impl Nfp {
    pub fn shapes(&self) -> Vec<&NfpShape> {
        match self {
            Nfp::Single(s) => vec![s],
            Nfp::Many(v) => v.iter().collect(),
        }
    }

    /// Every vertex across every region, for candidate-position scans.
    pub fn all_points(&self) -> Vec<Point> {
        self.shapes().into_iter().flat_map(|s| s.points.iter().copied()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes().iter().all(|s| s.points.len() < 3)
    }
}

/// Content-addressed cache key. `a_rot`/`b_rot` are
/// integer-truncated rotations; `inside` distinguishes an inner-NFP
/// entry from an outer one so the two never collide even when `a_rot`
/// happens to coincide (inner_nfp always stores under `a_rot = 0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NfpKey {
    pub a_source: u32,
    pub b_source: u32,
    pub a_rot: i32,
    pub b_rot: i32,
    pub a_flip: bool,
    pub b_flip: bool,
    pub inside: bool,
}

impl NfpKey {
    pub fn new(a_source: u32, b_source: u32, a_rot: i32, b_rot: i32, inside: bool) -> Self {
        Self { a_source, b_source, a_rot, b_rot, a_flip: false, b_flip: false, inside }
    }

    /// Deterministic string key.
    pub fn cache_key(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}-{}{}",
            self.a_source,
            self.b_source,
            self.a_rot,
            self.b_rot,
            if self.a_flip { "1" } else { "0" },
            if self.b_flip { "1" } else { "0" },
            if self.inside { "-in" } else { "" },
        )
    }
}

fn scale_points(points: &[Point], scale: f64) -> Vec<Point> {
    points.iter().map(|p| Point { x: (p.x * scale).round(), y: (p.y * scale).round(), exact: p.exact }).collect()
}

fn unscale_points(points: &[Point], scale: f64) -> Vec<Point> {
    points.iter().map(|p| Point { x: p.x / scale, y: p.y / scale, exact: p.exact }).collect()
}

/// Outer NFP of `a`/`b` (`inside = false`), or the inner-fit region of
/// `b` inside `a`'s outer ring alone (`inside = true`; A's own holes are
/// not considered here — `inner_nfp` handles those separately). Looks up
/// `cache` first and inserts the computed result on a miss.
pub fn outer_nfp(
    cache: &crate::cache::NfpCache,
    clip: &dyn ClipEngine,
    scale: f64,
    a: &Polygon,
    b: &Polygon,
    inside: bool,
) -> Option<Nfp> {
    let key = NfpKey::new(a.source, b.source, a.rotation_key(), b.rotation_key(), inside);
    if let Some(hit) = cache.find(&key) {
        return Some(hit);
    }

    let result = if inside {
        erode_region(clip, &a.points, &b.points).map(rings_to_nfp)
    } else {
        minkowski_outer_region(clip, scale, &a.points, &child_rings(a), &b.points).map(Nfp::Single)
    }?;

    if result.is_empty() {
        return None;
    }
    cache.insert(&key, result.clone());
    Some(result)
}

fn child_rings(a: &Polygon) -> Vec<Ring> {
    a.children.iter().map(|c| c.points.clone()).collect()
}

/// Cache key for an `(a, b, inside)` outer-NFP pair, exposed so the
/// evaluator can batch cache writes after a parallel precompute pass
/// instead of writing from worker threads, keeping the cache
/// single-writer.
pub fn key_for(a: &Polygon, b: &Polygon, inside: bool) -> NfpKey {
    NfpKey::new(a.source, b.source, a.rotation_key(), b.rotation_key(), inside)
}

/// The pure Minkowski-sum computation behind [`outer_nfp`]'s
/// `inside = false` branch, without any cache access — what a worker
/// thread actually runs: a single outer NFP via Minkowski only.
pub fn compute_outer_minkowski(clip: &dyn ClipEngine, scale: f64, a: &Polygon, b: &Polygon) -> Option<Nfp> {
    minkowski_outer_region(clip, scale, &a.points, &child_rings(a), &b.points).map(Nfp::Single)
}

fn rings_to_nfp(rings: Vec<Ring>) -> Nfp {
    let shapes: Vec<NfpShape> = rings.into_iter().filter(|r| r.len() >= 3).map(|points| NfpShape { points, children: Vec::new() }).collect();
    match shapes.len() {
        1 => Nfp::Single(shapes.into_iter().next().unwrap()),
        _ => Nfp::Many(shapes),
    }
}

/// Minkowski-sum-based outer NFP of `a` (outer ring `a_outer` with
/// interior holes `a_holes`) against `b`, scaled up to the clipper's
/// integer domain and back. Selects the component with the largest
/// negative (clockwise, per this crate's area sign convention — see
/// geometry.rs module docs) area; ties break by earlier position in the
/// Minkowski result.
fn minkowski_outer_region(clip: &dyn ClipEngine, scale: f64, a_outer: &[Point], a_holes: &[Ring], b: &[Point]) -> Option<NfpShape> {
    if a_outer.len() < 3 || b.len() < 3 {
        return None;
    }
    let a_scaled = scale_points(a_outer, scale);
    let a_holes_scaled: Vec<Ring> = a_holes.iter().map(|h| scale_points(h, scale)).collect();
    let neg_b_scaled: Vec<Point> = scale_points(b, scale).into_iter().map(|p| Point { x: -p.x, y: -p.y, exact: p.exact }).collect();

    let components = clip.minkowski_sum_with_holes(&a_scaled, &a_holes_scaled, &neg_b_scaled);
    if components.is_empty() {
        return None;
    }

    let mut best: Option<(f64, usize, Ring)> = None;
    for (i, comp) in components.into_iter().enumerate() {
        let area = geometry::polygon_area(&comp);
        let better = match &best {
            None => true,
            Some((best_area, best_i, _)) => area < *best_area || (area == *best_area && i < *best_i),
        };
        if better {
            best = Some((area, i, comp));
        }
    }
    let (_, _, chosen) = best?;
    let unscaled = unscale_points(&chosen, scale);
    let reference = b[0];
    let shifted = geometry::translate_polygon(&unscaled, reference.x, reference.y);
    Some(NfpShape { points: shifted, children: Vec::new() })
}

/// Inner-fit erosion of `a_outer` by `b`: the set of positions of `b`'s
/// reference vertex (`b[0]`) such that `b`, translated there, lies
/// entirely inside `a_outer`. For each vertex `v` of `b`, `a_outer`
/// translated by `(b[0] - v)` is the set of positions where that single
/// vertex stays inside `a_outer`; intersecting over every vertex of `b`
/// gives the region where *all* of `b` stays inside. Exact for convex
/// `b`; a practical (and standard) approximation for concave `b`.
fn erode_region(clip: &dyn ClipEngine, a_outer: &[Point], b: &[Point]) -> Option<Vec<Ring>> {
    if a_outer.len() < 3 || b.len() < 3 {
        return None;
    }
    let reference = b[0];
    let mut candidate: Vec<Ring> = vec![a_outer.to_vec()];
    for v in b {
        let dx = reference.x - v.x;
        let dy = reference.y - v.y;
        let shifted = geometry::translate_polygon(a_outer, dx, dy);
        candidate = clip.intersection(&candidate, &[shifted], FillRule::NonZero);
        if candidate.is_empty() {
            return None;
        }
    }
    let rings: Vec<Ring> = candidate.into_iter().filter(|r| r.len() >= 3).collect();
    if rings.is_empty() { None } else { Some(rings) }
}

/// Inner NFP of `b` inside `a`, holes subtracted. Cached under a key
/// that forces `a_rot = 0` — inner NFPs are computed against the
/// container's nominal orientation; sheets are not themselves rotated
/// by the placer.
pub fn inner_nfp(cache: &crate::cache::NfpCache, clip: &dyn ClipEngine, scale: f64, a: &Polygon, b: &Polygon) -> Option<Nfp> {
    let key = NfpKey::new(a.source, b.source, 0, b.rotation_key(), true);
    if let Some(hit) = cache.find(&key) {
        return Some(hit);
    }

    let interior_rings = erode_region(clip, &a.points, &b.points)?;

    let mut regions: Vec<NfpShape> = Vec::new();
    for ring in interior_rings {
        let mut avoid: Vec<Ring> = Vec::new();
        for hole in &a.children {
            if let Some(shape) = minkowski_outer_region(clip, scale, &hole.points, &[], &b.points) {
                avoid.push(shape.points);
            }
        }
        let remaining = if avoid.is_empty() { vec![ring] } else { clip.difference(&[ring], &avoid, FillRule::EvenOdd) };
        for r in remaining {
            if r.len() >= 3 {
                regions.push(NfpShape { points: r, children: Vec::new() });
            }
        }
    }

    if regions.is_empty() {
        return None;
    }
    let result = if regions.len() == 1 { Nfp::Single(regions.into_iter().next().unwrap()) } else { Nfp::Many(regions) };
    cache.insert(&key, result.clone());
    Some(result)
}
