//! Evaluator and worker pool (component C7).
//!
//! Per individual: expand its gene into rotated parts, enumerate the
//! unordered `(i, j)` pairs not already cached, compute their outer
//! NFPs in parallel via `rayon` (Minkowski only — the synchronous
//! inner-fit/hole routines stay on this thread), insert the batch into
//! the cache from this thread alone (the cache's single-writer
//! contract), then hand everything to the placer.

use crate::cache::NfpCache;
use crate::clipping::ClipEngine;
use crate::config::Config;
use crate::error::NestError;
use crate::ga::Individual;
use crate::nfp;
use crate::part::Polygon;
use crate::placer::{self, PlaceResult};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Evaluate one individual against `sheets`, warming `cache` with every
/// pairwise outer NFP its parts need before invoking the placer.
/// `progress` receives `0.5 * spawned / pair_count` during the worker
/// phase and `0.5 + 0.5 * placed / total` during placement. Returns
/// `None` only when the placer itself found
/// nowhere to start (no sheets, or every part rejected before any
/// commit).
pub fn evaluate_individual(
    base_parts: &[Polygon],
    individual: &Individual,
    sheets: &[Polygon],
    config: &Config,
    cache: &NfpCache,
    clip: &dyn ClipEngine,
    stop: &AtomicBool,
    mut progress: impl FnMut(f64) + Send,
) -> Result<Option<PlaceResult>, NestError> {
    let mut parts = individual.expand(base_parts);
    if config.simplify {
        for p in &mut parts {
            p.children.clear();
        }
    }

    let pairs: Vec<(usize, usize)> = (0..parts.len()).flat_map(|i| ((i + 1)..parts.len()).map(move |j| (i, j))).collect();

    let pending: Vec<(usize, usize)> = pairs
        .into_iter()
        .filter(|&(i, j)| !cache.contains(&nfp::key_for(&parts[i], &parts[j], false)))
        .collect();

    let pair_count = pending.len().max(1);
    let spawned = AtomicUsize::new(0);
    let progress_lock = Mutex::new(&mut progress);

    let computed: Vec<Option<(nfp::NfpKey, nfp::Nfp)>> = pending
        .par_iter()
        .map(|&(i, j)| {
            if stop.load(Ordering::SeqCst) {
                return None;
            }
            let result = nfp::compute_outer_minkowski(clip, config.clipper_scale, &parts[i], &parts[j]);
            let n = spawned.fetch_add(1, Ordering::SeqCst) + 1;
            if let Ok(mut cb) = progress_lock.lock() {
                (*cb)(0.5 * n as f64 / pair_count as f64);
            }
            result.map(|shape| (nfp::key_for(&parts[i], &parts[j], false), shape))
        })
        .collect();

    drop(progress_lock);

    for entry in computed.into_iter().flatten() {
        let (key, value) = entry;
        cache.insert(&key, value);
    }

    if stop.load(Ordering::SeqCst) {
        return Err(NestError::Cancelled);
    }

    let placement_progress = |f: f64| progress(f);
    Ok(placer::place_parts(sheets, &parts, config, cache, clip, placement_progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipping::ClipperEngine;
    use crate::geometry::Point;

    fn square(side: f64, source: u32) -> Polygon {
        Polygon::new(vec![Point::exact(0.0, 0.0), Point::exact(side, 0.0), Point::exact(side, side), Point::exact(0.0, side)], source)
    }

    #[test]
    fn evaluates_identity_individual_and_warms_cache() {
        let sheet = square(100.0, 100).as_sheet();
        let base_parts = vec![square(10.0, 1), square(10.0, 2)];
        let individual = Individual::identity(2);
        let config = Config { rotations: 1, ..Config::default() };
        let cache = NfpCache::new();
        let clip = ClipperEngine::default();
        let stop = AtomicBool::new(false);

        let result = evaluate_individual(&base_parts, &individual, &[sheet], &config, &cache, &clip, &stop, |_| {})
            .expect("no error")
            .expect("placed");
        assert_eq!(result.placements[0].placements.len(), 2);
        assert!(cache.stats() >= 1);
    }

    #[test]
    fn stop_flag_cancels_before_placement() {
        let sheet = square(100.0, 100).as_sheet();
        let base_parts = vec![square(10.0, 1), square(10.0, 2), square(10.0, 3)];
        let individual = Individual::identity(3);
        let config = Config { rotations: 1, ..Config::default() };
        let cache = NfpCache::new();
        let clip = ClipperEngine::default();
        let stop = AtomicBool::new(true);

        let result = evaluate_individual(&base_parts, &individual, &[sheet], &config, &cache, &clip, &stop, |_| {});
        assert!(matches!(result, Err(NestError::Cancelled)));
    }
}
