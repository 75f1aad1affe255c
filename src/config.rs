//! Engine configuration. A `Config` is fully materialized by the host and
//! handed to [`crate::start`] verbatim — the engine never reads from disk
//! or holds defaults the host didn't pass in explicitly; persisted state
//! is entirely the host's responsibility.

use serde::{Deserialize, Serialize};

/// Placement scoring strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementType {
    Gravity,
    Box,
    ConvexHull,
}

impl Default for PlacementType {
    fn default() -> Self {
        PlacementType::Gravity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Extra offset between parts.
    pub spacing: f64,
    /// Polyline simplification tolerance.
    pub curve_tolerance: f64,
    /// Integer scaling factor for the clipping library.
    pub clipper_scale: f64,
    /// Number of discrete rotations per part, evenly distributed in `[0, 360)`.
    pub rotations: u32,
    /// GA population size.
    pub population_size: u32,
    /// Percent chance (0-100) per gene of mutating.
    pub mutation_rate: u8,
    /// Worker pool size.
    pub threads: u32,
    /// Placement scoring strategy.
    pub placement_type: PlacementType,
    /// Enable the shared-edge bonus.
    pub merge_lines: bool,
    /// Weight of the merged-line bonus against area, in `[0, 1]`.
    pub time_ratio: f64,
    /// Drop `children` during pair preprocessing.
    pub simplify: bool,
    /// Attempt to place parts inside holes of already-placed parts.
    pub use_holes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spacing: 0.0,
            curve_tolerance: crate::geometry::CURVE_TOLERANCE,
            clipper_scale: crate::geometry::CLIPPER_SCALE,
            rotations: 4,
            population_size: 10,
            mutation_rate: 10,
            threads: std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(4).clamp(2, 8),
            placement_type: PlacementType::Gravity,
            merge_lines: false,
            time_ratio: 0.5,
            simplify: false,
            use_holes: true,
        }
    }
}

impl Config {
    /// The discrete rotation set `{k·360/rotations : 0 <= k < rotations}`,
    /// computed once rather than re-derived at every call site.
    pub fn rotation_set(&self) -> Vec<f64> {
        if self.rotations == 0 {
            return vec![0.0];
        }
        (0..self.rotations).map(|k| k as f64 * 360.0 / self.rotations as f64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_set_is_evenly_spaced() {
        let cfg = Config { rotations: 4, ..Config::default() };
        assert_eq!(cfg.rotation_set(), vec![0.0, 90.0, 180.0, 270.0]);
    }

    #[test]
    fn rotation_set_of_one_is_just_zero() {
        let cfg = Config { rotations: 1, ..Config::default() };
        assert_eq!(cfg.rotation_set(), vec![0.0]);
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rotations, cfg.rotations);
        assert_eq!(back.placement_type, cfg.placement_type);
    }
}
