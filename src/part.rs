//! The engine's polygon data model: a `Polygon` carries the provenance
//! (`source`, `filename`), a per-placement `id`, its current `rotation`,
//! nested holes as owned `children`, and a `sheet` flag.
//!
//! `source` survives rotation/translation (copies of the same part share
//! it); `id` does not — each transform produces a fresh placement
//! instance.

use crate::geometry::{self, Bounds, Point};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh per-placement id. Monotonic, process-wide; not
/// persisted, not meaningful across runs.
pub fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Polygon {
    pub points: Vec<Point>,
    pub rotation: f64,
    pub source: u32,
    pub id: u64,
    pub filename: Option<String>,
    pub children: Vec<Polygon>,
    pub sheet: bool,
}

impl Polygon {
    pub fn new(points: Vec<Point>, source: u32) -> Self {
        Self {
            points,
            rotation: 0.0,
            source,
            id: next_id(),
            filename: None,
            children: Vec::new(),
            sheet: false,
        }
    }

    pub fn with_children(mut self, children: Vec<Polygon>) -> Self {
        self.children = children;
        self
    }

    pub fn as_sheet(mut self) -> Self {
        self.sheet = true;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn bounds(&self) -> Option<Bounds> {
        geometry::bounds(&self.points)
    }

    /// Bounds of the outer ring plus every child, i.e. the full footprint
    /// a placer needs to reason about.
    pub fn full_bounds(&self) -> Option<Bounds> {
        let mut rings: Vec<&[Point]> = vec![&self.points];
        rings.extend(self.children.iter().map(|c| c.points.as_slice()));
        geometry::bounds_many(rings)
    }

    pub fn area(&self) -> f64 {
        geometry::polygon_area(&self.points)
    }

    /// Net interior area: outer ring area plus every child's area.
    /// Children carry the opposite sign before canonicalization, so a
    /// plain sum nets out the hole area.
    pub fn net_area(&self) -> f64 {
        self.area() + self.children.iter().map(Polygon::net_area).sum::<f64>()
    }

    pub fn is_rectangle(&self, tol: f64) -> bool {
        geometry::is_rectangle(&self.points, tol)
    }

    /// New rotated instance. `source`/`filename` survive; `id` does not.
    /// Recurses into `children` so holes rotate along with their parent.
    pub fn rotate(&self, angle_deg: f64) -> Polygon {
        Polygon {
            points: geometry::rotate_polygon(&self.points, angle_deg),
            rotation: normalize_angle(self.rotation + angle_deg),
            source: self.source,
            id: next_id(),
            filename: self.filename.clone(),
            children: self.children.iter().map(|c| c.rotate(angle_deg)).collect(),
            sheet: self.sheet,
        }
    }

    /// New translated instance. `source`/`filename` survive; `id` does not.
    pub fn translate(&self, dx: f64, dy: f64) -> Polygon {
        Polygon {
            points: geometry::translate_polygon(&self.points, dx, dy),
            rotation: self.rotation,
            source: self.source,
            id: next_id(),
            filename: self.filename.clone(),
            children: self.children.iter().map(|c| c.translate(dx, dy)).collect(),
            sheet: self.sheet,
        }
    }

    /// Integer-truncated rotation, used as part of an `NfpKey`.
    pub fn rotation_key(&self) -> i32 {
        self.rotation.trunc() as i32
    }
}

fn normalize_angle(deg: f64) -> f64 {
    let r = deg % 360.0;
    if r < 0.0 { r + 360.0 } else { r }
}

/// Host-supplied description of a part to be nested: its geometry
/// (outer ring + holes, already normalized by the importer) and how many
/// copies to place.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PartSpec {
    pub source: u32,
    pub polygon: Polygon,
    pub quantity: u32,
}

impl PartSpec {
    pub fn new(source: u32, polygon: Polygon, quantity: u32) -> Self {
        Self { source, polygon, quantity }
    }

    /// Whether this part's rotation domain may be halved by an optional
    /// bilateral-symmetry preprocessing step. Detected by
    /// checking whether mirroring the outer ring about its centroid axis
    /// reproduces the same point set within tolerance; left conservative
    /// (returns `false`) unless the shape is an exact rectangle, the only
    /// case cheap enough to decide without a full symmetry search.
    pub fn has_bilateral_symmetry(&self) -> bool {
        self.polygon.children.is_empty() && self.polygon.is_rectangle(geometry::RECTANGLE_TOLERANCE)
    }
}

/// Host-supplied sheet to place parts onto.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SheetSpec {
    pub source: u32,
    pub polygon: Polygon,
}

impl SheetSpec {
    pub fn new(source: u32, mut polygon: Polygon) -> Self {
        polygon.sheet = true;
        Self { source, polygon }
    }
}

/// Expand `parts` by quantity into individually-placeable instances,
/// each a fresh `Polygon` copy sharing its origin's `source`. This is the
/// GA's gene universe: one gene per instance, not per distinct part.
pub fn expand_parts(parts: &[PartSpec]) -> Vec<Polygon> {
    let mut out = Vec::new();
    for spec in parts {
        for _ in 0..spec.quantity {
            out.push(spec.polygon.rotate(0.0));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn square(side: f64) -> Polygon {
        Polygon::new(
            vec![Point::new(0.0, 0.0), Point::new(side, 0.0), Point::new(side, side), Point::new(0.0, side)],
            1,
        )
    }

    #[test]
    fn rotate_preserves_source_not_id() {
        let p = square(10.0);
        let r = p.rotate(90.0);
        assert_eq!(r.source, p.source);
        assert_ne!(r.id, p.id);
    }

    #[test]
    fn net_area_subtracts_hole() {
        let mut outer = square(20.0);
        let mut hole = square(10.0);
        // opposite sign convention before canonicalization: flip hole winding
        hole.points.reverse();
        outer.children.push(hole);
        let net = outer.net_area().abs();
        assert!((net - 300.0).abs() < 1e-6, "expected 400-100=300, got {net}");
    }

    #[test]
    fn expand_parts_respects_quantity() {
        let spec = PartSpec::new(1, square(5.0), 3);
        let expanded = expand_parts(&[spec]);
        assert_eq!(expanded.len(), 3);
        assert!(expanded.iter().all(|p| p.source == 1));
        let ids: std::collections::HashSet<u64> = expanded.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 3);
    }
}
