//! Greedy placer (component C5).
//!
//! `place_parts` positions a pre-ordered, pre-rotated list of part
//! instances onto a list of sheets: big parts and holed parts go first
//! within each sheet, each part tries every already-placed part's holes
//! before falling back to the sheet's inner NFP, and candidates are
//! scored by the configured [`PlacementType`] with an optional
//! shared-edge bonus.

use crate::cache::NfpCache;
use crate::clipping::{ClipEngine, FillRule, Ring};
use crate::config::{Config, PlacementType};
use crate::geometry::{self, Point};
use crate::line_merge::{self, Segment};
use crate::nfp::{self, Nfp};
use crate::part::Polygon;

#[derive(Debug, Clone)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub id: u64,
    pub source: u32,
    pub rotation: f64,
    pub filename: Option<String>,
    pub placed_in_hole: bool,
    pub hole_parent_id: Option<u64>,
    pub merged_length: Option<f64>,
    pub merged_segments: Option<Vec<Segment>>,
    pub hull: Option<Vec<Point>>,
}

#[derive(Debug, Clone)]
pub struct SheetPlacement {
    pub sheet_source: u32,
    pub sheet_id: u64,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone)]
pub struct PlaceResult {
    pub placements: Vec<SheetPlacement>,
    pub fitness: f64,
    pub area: f64,
    pub merged_length: f64,
    pub parts_in_holes: u32,
}

/// A part instance queued for placement, carrying its world-space
/// geometry (already rotated to the gene's chosen angle).
pub type PartInstance = Polygon;

/// A part's world-space footprint once committed, kept around for
/// collision checks and hole search against later parts.
struct Placed {
    // The rotated-but-untranslated part, in the same local frame the NFP
    // cache keys on (source, rotation) — `outer_nfp` against this, not
    // against `polygon`, is what makes the cache hit correctly across two
    // placements of the same source/rotation.
    canonical: Polygon,
    // World-space shift applied to `canonical` to reach `polygon`. Every
    // outer NFP computed against `canonical` must be translated by this
    // before it means anything in sheet coordinates (spec §4.5 step 3).
    offset: (f64, f64),
    polygon: Polygon, // already translated to world coordinates
    placement_idx: usize, // index into the owning SheetPlacement::placements
}

struct ClipCacheEntry {
    union: Vec<Ring>,
    placed_count: usize,
}

/// Position and optionally commit the candidate to the incremental
/// no-fit union cache keyed by `(source, rotation)`.
fn region_key(p: &Polygon) -> (u32, i32) {
    (p.source, p.rotation_key())
}

pub fn place_parts(
    sheets: &[Polygon],
    parts: &[PartInstance],
    config: &Config,
    cache: &NfpCache,
    clip: &dyn ClipEngine,
    mut progress: impl FnMut(f64),
) -> Option<PlaceResult> {
    if parts.is_empty() {
        return Some(PlaceResult { placements: Vec::new(), fitness: 0.0, area: 0.0, merged_length: 0.0, parts_in_holes: 0 });
    }
    if sheets.is_empty() {
        return None;
    }

    let total_parts = parts.len();
    let mut remaining: Vec<Polygon> = parts.to_vec();
    let mut out_sheets: Vec<SheetPlacement> = Vec::new();
    let mut fitness = 0.0_f64;
    let mut total_sheet_area = 0.0_f64;
    let mut total_merged = 0.0_f64;
    let mut parts_in_holes = 0_u32;
    let mut placed_count = 0_usize;

    for sheet in sheets {
        if remaining.is_empty() {
            break;
        }
        let Some(sheet_bounds) = sheet.bounds() else { continue };
        let sheet_area = sheet_bounds.width * sheet_bounds.height;
        total_sheet_area += sheet_area;
        fitness += sheet_area;

        sort_by_priority(&mut remaining, &sheet_bounds);

        let mut sheet_placed: Vec<Placed> = Vec::new();
        let mut sheet_out = SheetPlacement { sheet_source: sheet.source, sheet_id: sheet.id, placements: Vec::new() };
        let mut clip_cache: std::collections::HashMap<(u32, i32), ClipCacheEntry> = std::collections::HashMap::new();
        let mut next_round: Vec<Polygon> = Vec::new();

        let mut i = 0;
        while i < remaining.len() {
            let part = remaining[i].clone();

            if config.use_holes {
                if let Some((hole_parent_idx, placement)) = try_place_in_hole(&sheet_placed, &part, cache, clip, config) {
                    let id = part.id;
                    let source = part.source;
                    let rotation = part.rotation;
                    let filename = part.filename.clone();
                    let offset = (placement.0 - part.points[0].x, placement.1 - part.points[0].y);
                    let world = part.translate(offset.0, offset.1);
                    let parent_id = sheet_out.placements[hole_parent_idx].id;
                    sheet_out.placements.push(Placement {
                        x: placement.0,
                        y: placement.1,
                        id,
                        source,
                        rotation,
                        filename,
                        placed_in_hole: true,
                        hole_parent_id: Some(parent_id),
                        merged_length: None,
                        merged_segments: None,
                        hull: None,
                    });
                    sheet_placed.push(Placed { canonical: part.clone(), offset, polygon: world, placement_idx: sheet_out.placements.len() - 1 });
                    parts_in_holes += 1;
                    placed_count += 1;
                    progress(0.5 + 0.5 * placed_count as f64 / total_parts as f64);
                    i += 1;
                    continue;
                }
            }

            let mut candidate_part = part.clone();
            let mut inner = nfp::inner_nfp(cache, clip, config.clipper_scale, sheet, &candidate_part);
            if inner.as_ref().map_or(true, Nfp::is_empty) {
                let rotations = config.rotation_set();
                for angle in rotations.iter().skip(1) {
                    let rotated = part.rotate(*angle - part.rotation);
                    let attempt = nfp::inner_nfp(cache, clip, config.clipper_scale, sheet, &rotated);
                    if attempt.as_ref().map_or(false, |n| !n.is_empty()) {
                        candidate_part = rotated;
                        inner = attempt;
                        break;
                    }
                }
            }

            let Some(inner_nfp) = inner else {
                // cannot fit on this sheet in any tried rotation: unplaceable, full stop
                i += 1;
                continue;
            };

            let no_fit = if sheet_placed.is_empty() {
                None
            } else {
                Some(no_fit_region(&sheet_placed, &candidate_part, cache, clip, config, &mut clip_cache))
            };

            let free_region: Vec<Ring> = match &no_fit {
                None => inner_nfp.shapes().into_iter().map(|s| s.points.clone()).collect(),
                Some(forbidden) => {
                    let interior: Vec<Ring> = inner_nfp.shapes().into_iter().map(|s| s.points.clone()).collect();
                    clip.difference(&interior, forbidden, FillRule::EvenOdd)
                }
            };

            if free_region.is_empty() {
                next_round.push(part);
                i += 1;
                continue;
            }

            let reference = candidate_part.points[0];
            let candidates: Vec<Point> = free_region.iter().flatten().copied().collect();

            let mut best: Option<(f64, Polygon, (f64, f64))> = None;
            for v in &candidates {
                let shift = (v.x - reference.x, v.y - reference.y);
                let shifted = candidate_part.translate(shift.0, shift.1);
                let Some(b) = shifted.bounds() else { continue };
                if b.x < sheet_bounds.x - 1e-6
                    || b.y < sheet_bounds.y - 1e-6
                    || b.x + b.width > sheet_bounds.x + sheet_bounds.width + 1e-6
                    || b.y + b.height > sheet_bounds.y + sheet_bounds.height + 1e-6
                {
                    continue;
                }
                if sheet_placed.is_empty() {
                    // first part: top-left bias (min x, then y)
                    let better = best.as_ref().map_or(true, |(_, _, (bx, by))| (v.x, v.y) < (*bx, *by));
                    if better {
                        best = Some((0.0, shifted, (v.x, v.y)));
                    }
                    continue;
                }
                if collides(&sheet_placed, &shifted) {
                    continue;
                }
                let mut score = score_candidate(config.placement_type, &sheet_placed, &shifted);
                if config.merge_lines {
                    let already: Vec<Polygon> = sheet_placed.iter().map(|p| p.polygon.clone()).collect();
                    let (merged_len, _segs) = line_merge::merged_length(&already, &shifted, 0.5, 0.1 * config.curve_tolerance);
                    score -= merged_len * config.time_ratio;
                }
                // ties broken by top-left bias (min x, then y), matching the
                // first-part rule above
                let better = match &best {
                    None => true,
                    Some((best_score, _, (bx, by))) => score < *best_score - 1e-9 || (score < *best_score + 1e-9 && (v.x, v.y) < (*bx, *by)),
                };
                if better {
                    best = Some((score, shifted, (v.x, v.y)));
                }
            }

            let Some((_score, committed, (cx, cy))) = best else {
                next_round.push(part);
                i += 1;
                continue;
            };

            let bounds = committed.bounds().unwrap_or(geometry::Bounds { x: cx, y: cy, width: 0.0, height: 0.0 });
            fitness += bounds.width / sheet_area + bounds.width * bounds.height;

            let merged = if config.merge_lines && !sheet_placed.is_empty() {
                let already: Vec<Polygon> = sheet_placed.iter().map(|p| p.polygon.clone()).collect();
                let (len, segs) = line_merge::merged_length(&already, &committed, 0.5, 0.1 * config.curve_tolerance);
                total_merged += len;
                (Some(len), Some(segs))
            } else {
                (None, None)
            };

            sheet_out.placements.push(Placement {
                x: cx,
                y: cy,
                id: committed.id,
                source: committed.source,
                rotation: committed.rotation,
                filename: committed.filename.clone(),
                placed_in_hole: false,
                hole_parent_id: None,
                merged_length: merged.0,
                merged_segments: merged.1,
                hull: match config.placement_type {
                    PlacementType::ConvexHull => Some(geometry::convex_hull(&committed.points)),
                    _ => None,
                },
            });
            let idx = sheet_out.placements.len() - 1;
            let offset = (cx - reference.x, cy - reference.y);
            sheet_placed.push(Placed { canonical: candidate_part.clone(), offset, polygon: committed, placement_idx: idx });
            placed_count += 1;
            progress(0.5 + 0.5 * placed_count as f64 / total_parts as f64);
            i += 1;
        }

        if !sheet_out.placements.is_empty() {
            out_sheets.push(sheet_out);
        }
        remaining = next_round;
    }

    for part in &remaining {
        fitness += 1e8 * part.area().abs() / total_sheet_area.max(1e-9);
    }

    if parts_in_holes > 0 {
        fitness -= 0.05 * parts_in_holes as f64 * fitness;
    }

    if out_sheets.is_empty() {
        return None;
    }

    Some(PlaceResult { placements: out_sheets, fitness, area: total_sheet_area, merged_length: total_merged, parts_in_holes })
}

/// Stable three-bucket sort: big parts, then holed parts, then everything
/// else, preserving relative order within each bucket.
fn sort_by_priority(parts: &mut [Polygon], sheet_bounds: &geometry::Bounds) {
    let bucket = |p: &Polygon| -> u8 {
        let b = match p.bounds() {
            Some(b) => b,
            None => return 2,
        };
        if b.width > 0.5 * sheet_bounds.width || b.height > 0.5 * sheet_bounds.height {
            0
        } else if !p.children.is_empty() {
            1
        } else {
            2
        }
    };
    parts.sort_by_key(bucket); // stable sort preserves original relative order
}

fn collides(placed: &[Placed], candidate: &Polygon) -> bool {
    for q in placed {
        if !geometry::polygons_intersect(&q.polygon.points, &candidate.points, 0.0, 0.0, 0.0, 0.0) {
            continue;
        }
        // permitted if candidate sits entirely inside one of q's holes
        let mut in_hole = false;
        for hole in &q.polygon.children {
            if geometry::polygon_contains_polygon(&hole.points, &candidate.points, 0.0, 0.0, 0.0, 0.0) {
                in_hole = true;
                break;
            }
        }
        if !in_hole {
            return true;
        }
    }
    false
}

fn score_candidate(kind: PlacementType, placed: &[Placed], candidate: &Polygon) -> f64 {
    match kind {
        PlacementType::Gravity => {
            let mut rings: Vec<&[Point]> = placed.iter().map(|p| p.polygon.points.as_slice()).collect();
            rings.push(&candidate.points);
            let b = geometry::bounds_many(rings).unwrap_or(geometry::Bounds { x: 0.0, y: 0.0, width: 0.0, height: 0.0 });
            5.0 * b.width + b.height
        }
        PlacementType::Box => {
            let mut rings: Vec<&[Point]> = placed.iter().map(|p| p.polygon.points.as_slice()).collect();
            rings.push(&candidate.points);
            let b = geometry::bounds_many(rings).unwrap_or(geometry::Bounds { x: 0.0, y: 0.0, width: 0.0, height: 0.0 });
            b.width * b.height
        }
        PlacementType::ConvexHull => {
            let mut points: Vec<Point> = placed.iter().flat_map(|p| p.polygon.points.iter().copied()).collect();
            points.extend(candidate.points.iter().copied());
            geometry::polygon_area(&geometry::convex_hull(&points)).abs()
        }
    }
}

/// Union of every already-placed part's outer NFP against `candidate`,
/// each translated to that part's committed world position. `clip_cache`
/// memoizes the union per `(source, rotation)` so repeated candidates of
/// the same part/rotation in one sheet don't redo work already covered by
/// a smaller `sheet_placed` prefix.
fn no_fit_region(
    sheet_placed: &[Placed],
    candidate: &Polygon,
    cache: &NfpCache,
    clip: &dyn ClipEngine,
    config: &Config,
    clip_cache: &mut std::collections::HashMap<(u32, i32), ClipCacheEntry>,
) -> Vec<Ring> {
    let key = region_key(candidate);
    let entry = clip_cache.entry(key).or_insert(ClipCacheEntry { union: Vec::new(), placed_count: 0 });
    if entry.placed_count > sheet_placed.len() {
        entry.union.clear();
        entry.placed_count = 0;
    }
    for placed in &sheet_placed[entry.placed_count..] {
        if let Some(nfp) = nfp::outer_nfp(cache, clip, config.clipper_scale, &placed.canonical, candidate, false) {
            let translated = translate_rings(shape_rings(&nfp), placed.offset.0, placed.offset.1);
            let mut combined = entry.union.clone();
            combined.extend(translated);
            entry.union = clip.union(&combined, FillRule::NonZero);
        }
    }
    entry.placed_count = sheet_placed.len();
    entry.union.clone()
}

fn shape_rings(nfp: &Nfp) -> Vec<Ring> {
    nfp.shapes().into_iter().map(|s| s.points.clone()).collect()
}

/// `outer_nfp` is cached and computed against a placed part's untranslated
/// `canonical` geometry (so two placements of the same source/rotation
/// share one cache entry, per spec.md §3's NfpKey); the result is only
/// meaningful once shifted by that part's actual world `offset` (spec
/// §4.5 step 3: "translated by placements_j").
fn translate_rings(rings: Vec<Ring>, dx: f64, dy: f64) -> Vec<Ring> {
    rings.into_iter().map(|r| geometry::translate_polygon(&r, dx, dy)).collect()
}

/// Try every already-placed part's holes for `part`, returning the
/// committed world position and the index of the parent placement on
/// success.
fn try_place_in_hole(
    sheet_placed: &[Placed],
    part: &Polygon,
    cache: &NfpCache,
    clip: &dyn ClipEngine,
    config: &Config,
) -> Option<(usize, (f64, f64))> {
    for q in sheet_placed {
        if q.polygon.children.is_empty() {
            continue;
        }
        for hole in &q.polygon.children {
            let hole_world = hole.points.clone(); // hole already carries q's world translation (see Polygon::translate)
            let existing: Vec<&Placed> = sheet_placed
                .iter()
                .filter(|p| p.polygon.id != q.polygon.id)
                .filter(|p| geometry::polygon_contains_polygon(&hole_world, &p.polygon.points, 0.0, 0.0, 0.0, 0.0))
                .collect();
            if let Some(pos) = place_in_hole(&hole_world, &existing, part, cache, clip, config) {
                return Some((q.placement_idx, pos));
            }
        }
    }
    None
}

fn place_in_hole(
    hole_world: &[Point],
    existing_in_hole: &[&Placed],
    part: &Polygon,
    cache: &NfpCache,
    clip: &dyn ClipEngine,
    config: &Config,
) -> Option<(f64, f64)> {
    let hole_bounds = geometry::bounds(hole_world)?;
    let part_bounds = part.bounds()?;
    if part_bounds.width > hole_bounds.width || part_bounds.height > hole_bounds.height {
        return None;
    }
    let reference = part.points[0];

    if existing_in_hole.is_empty() {
        let margin = 1.0;
        let shift = (hole_bounds.x + margin - part_bounds.x, hole_bounds.y + margin - part_bounds.y);
        let shifted = geometry::translate_polygon(&part.points, shift.0, shift.1);
        if shifted.iter().all(|p| geometry::point_in_polygon(hole_world, p.x, p.y)) {
            return Some((reference.x + shift.0, reference.y + shift.1));
        }
        return None;
    }

    let mut forbidden: Vec<Ring> = Vec::new();
    for p in existing_in_hole {
        if let Some(nfp) = nfp::outer_nfp(cache, clip, config.clipper_scale, &p.canonical, part, false) {
            forbidden.extend(translate_rings(shape_rings(&nfp), p.offset.0, p.offset.1));
        }
    }
    let forbidden_union = clip.union(&forbidden, FillRule::NonZero);
    let region = clip.difference(&[hole_world.to_vec()], &forbidden_union, FillRule::EvenOdd);

    let mut best: Option<(f64, f64, f64)> = None; // (x+y, x, y)
    for ring in &region {
        for v in ring {
            let shift = (v.x - reference.x, v.y - reference.y);
            let shifted = geometry::translate_polygon(&part.points, shift.0, shift.1);
            if !shifted.iter().all(|p| geometry::point_in_polygon(hole_world, p.x, p.y)) {
                continue;
            }
            let Some(b) = geometry::bounds(&shifted) else { continue };
            let score = b.x + b.y;
            if best.map_or(true, |(s, _, _)| score < s) {
                best = Some((score, v.x, v.y));
            }
        }
    }
    best.map(|(_, x, y)| (x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipping::ClipperEngine;
    use crate::config::Config;
    use crate::geometry::Point;

    fn square(side: f64, source: u32) -> Polygon {
        Polygon::new(
            vec![
                Point::exact(0.0, 0.0),
                Point::exact(side, 0.0),
                Point::exact(side, side),
                Point::exact(0.0, side),
            ],
            source,
        )
    }

    #[test]
    fn single_square_on_single_sheet() {
        let sheet = square(100.0, 100).as_sheet();
        let part = square(10.0, 1);
        let cache = NfpCache::new();
        let clip = ClipperEngine::default();
        let config = Config { rotations: 1, ..Config::default() };
        let result = place_parts(&[sheet], &[part], &config, &cache, &clip, |_| {}).expect("placed");
        assert_eq!(result.placements.len(), 1);
        let p = &result.placements[0].placements[0];
        assert!((p.x).abs() < 1e-6);
        assert!((p.y).abs() < 1e-6);
    }

    #[test]
    fn two_squares_gravity_places_side_by_side() {
        let sheet = square(100.0, 100).as_sheet();
        let part = square(10.0, 1);
        let cache = NfpCache::new();
        let clip = ClipperEngine::default();
        let config = Config { rotations: 1, placement_type: PlacementType::Gravity, ..Config::default() };
        let parts = vec![part.clone(), part.rotate(0.0)];
        let result = place_parts(&[sheet], &parts, &config, &cache, &clip, |_| {}).expect("placed");
        assert_eq!(result.placements[0].placements.len(), 2);
    }

    #[test]
    fn repeated_part_placements_do_not_overlap() {
        // Three copies of the same source/rotation exercise the NFP cache's
        // (source, rotation) key across multiple world positions: each
        // outer NFP must be translated by its own placed part's offset, not
        // reused verbatim, or the second and third copies would be screened
        // against the first copy's NFP still sitting at the origin.
        let sheet = square(100.0, 100.0).as_sheet();
        let part = square(10.0, 1);
        let cache = NfpCache::new();
        let clip = ClipperEngine::default();
        let config = Config { rotations: 1, placement_type: PlacementType::Gravity, ..Config::default() };
        let parts = vec![part.clone(), part.clone(), part.clone()];
        let result = place_parts(&[sheet], &parts, &config, &cache, &clip, |_| {}).expect("placed");
        let placements = &result.placements[0].placements;
        assert_eq!(placements.len(), 3);
        for i in 0..placements.len() {
            for j in (i + 1)..placements.len() {
                let a = geometry::translate_polygon(&square(10.0, 1).points, placements[i].x, placements[i].y);
                let b = geometry::translate_polygon(&square(10.0, 1).points, placements[j].x, placements[j].y);
                assert!(!geometry::polygons_intersect(&a, &b, 0.0, 0.0, 0.0, 0.0), "placements {i} and {j} overlap");
            }
        }
    }

    #[test]
    fn empty_parts_returns_zero_fitness() {
        let sheet = square(100.0, 100).as_sheet();
        let cache = NfpCache::new();
        let clip = ClipperEngine::default();
        let config = Config::default();
        let result = place_parts(&[sheet], &[], &config, &cache, &clip, |_| {}).expect("result");
        assert!(result.placements.is_empty());
        assert_eq!(result.fitness, 0.0);
    }

    #[test]
    fn zero_sheets_returns_none() {
        let part = square(10.0, 1);
        let cache = NfpCache::new();
        let clip = ClipperEngine::default();
        let config = Config::default();
        assert!(place_parts(&[], &[part], &config, &cache, &clip, |_| {}).is_none());
    }

    #[test]
    fn oversized_part_stays_unplaced_and_penalized() {
        let sheet = square(10.0, 100).as_sheet();
        let part = square(50.0, 1);
        let cache = NfpCache::new();
        let clip = ClipperEngine::default();
        let config = Config { rotations: 1, ..Config::default() };
        let result = place_parts(&[sheet], &[part], &config, &cache, &clip, |_| {});
        match result {
            None => {}
            Some(r) => assert!(r.placements.iter().all(|s| s.placements.is_empty())),
        }
    }
}
