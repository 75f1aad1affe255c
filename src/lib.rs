//! `deepnest_engine` — a 2D irregular-shape nesting engine.
//!
//! The public surface is deliberately small: [`start`] hands
//! the host a [`NestHandle`] and begins a genetic-algorithm search on a
//! background thread; [`NestHandle::stop`] requests cooperative
//! termination; [`reset`] clears a session's NFP cache. Everything else
//! — geometry, clipping, the NFP engine, the placer, the GA driver, the
//! evaluator — is exposed as library modules so a host can also drive
//! individual pieces directly (as the CLI binary does for a one-shot
//! nest).

pub mod cache;
pub mod clipping;
pub mod config;
#[cfg(feature = "dxf")]
pub mod dxf_parser;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod ga;
pub mod geometry;
pub mod line_merge;
pub mod nfp;
pub mod part;
pub mod placer;
pub mod svg_parser;

pub use config::{Config, PlacementType};
pub use error::NestError;
pub use events::{NestComplete, NestHandle, NestProgress, WorkerStatus};
pub use ga::{GeneticAlgorithm, Individual};
pub use part::{PartSpec, Polygon, SheetSpec};
pub use placer::PlaceResult;

use cache::NfpCache;
use clipping::ClipperEngine;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Rejects self-evidently broken input geometry before a nest begins:
/// fewer than 3 points, or zero area, at any nesting depth. Full
/// self-intersection testing is importer work — self-intersecting
/// inputs are rejected at import, not here; this is the core's own
/// last-line check.
fn validate_polygon(source: u32, p: &Polygon) -> Result<(), NestError> {
    if p.points.len() < 3 {
        return Err(NestError::InvalidGeometry { source, message: format!("fewer than 3 points ({})", p.points.len()) });
    }
    if p.area().abs() < 1e-9 {
        return Err(NestError::InvalidGeometry { source, message: "degenerate (zero-area) polygon".to_string() });
    }
    for child in &p.children {
        validate_polygon(source, child)?;
    }
    Ok(())
}

/// Begin a GA nesting run on a background thread. Returns
/// immediately with a [`NestHandle`]; `progress_cb` and `result_cb` are
/// invoked from that background thread as the search proceeds.
///
/// Returns `Err` synchronously (no thread spawned) for the two fatal
/// taxonomy entries that prevent a nest from starting at all:
/// `InvalidGeometry` and `NoSheet`.
pub fn start(
    config: Config,
    parts: Vec<PartSpec>,
    sheets: Vec<SheetSpec>,
    mut progress_cb: impl FnMut(NestProgress) + Send + 'static,
    mut result_cb: impl FnMut(NestComplete) + Send + 'static,
) -> Result<NestHandle, NestError> {
    if sheets.is_empty() {
        return Err(NestError::NoSheet);
    }
    for spec in &parts {
        validate_polygon(spec.source, &spec.polygon)?;
    }
    for spec in &sheets {
        validate_polygon(spec.source, &spec.polygon)?;
    }

    let base_parts = part::expand_parts(&parts);
    let sheet_polys: Vec<Polygon> = sheets.into_iter().map(|s| s.polygon).collect();

    let stop_flag = Arc::new(AtomicBool::new(false));
    let status = events::new_shared_status();
    let cache = Arc::new(NfpCache::new());

    let thread_stop = Arc::clone(&stop_flag);
    let thread_status = Arc::clone(&status);
    let thread_cache = Arc::clone(&cache);

    let join = std::thread::spawn(move || {
        run_ga_loop(config, base_parts, sheet_polys, thread_cache, thread_stop, thread_status, &mut progress_cb, &mut result_cb);
    });

    Ok(NestHandle::new(stop_flag, status, join))
}

/// Clears a finished session's NFP cache and releases it.
/// Stops the run first if it is still going, then blocks until the GA
/// thread has actually exited, so the cache this drops is the only
/// remaining reference.
pub fn reset(handle: &mut NestHandle) {
    handle.stop();
    handle.join();
}

#[allow(clippy::too_many_arguments)]
fn run_ga_loop(
    config: Config,
    base_parts: Vec<Polygon>,
    sheets: Vec<Polygon>,
    cache: Arc<NfpCache>,
    stop: Arc<AtomicBool>,
    status: Arc<events::SharedStatus>,
    progress_cb: &mut dyn FnMut(NestProgress),
    result_cb: &mut dyn FnMut(NestComplete),
) {
    if base_parts.is_empty() {
        status.set(false, "no parts to place");
        result_cb(NestComplete { results: Vec::new() });
        return;
    }

    let clip = ClipperEngine::default();
    let mut rng = StdRng::from_entropy();
    let mut ga = GeneticAlgorithm::new(config.clone(), base_parts.clone(), &mut rng);
    let mut nest_index: u64 = 0;
    let mut best_history: Vec<PlaceResult> = Vec::new();
    let mut best_fitness = f64::MAX;

    status.set(true, "evaluating generation 0");

    while !stop.load(Ordering::SeqCst) {
        let sheets_ref = &sheets;
        let cache_ref = &cache;
        let clip_ref = &clip;
        let config_ref = &config;
        let base_ref = &base_parts;
        let stop_ref = &stop;

        ga.generation(
            |individual| {
                nest_index += 1;
                let idx = nest_index;
                let result = evaluator::evaluate_individual(
                    base_ref,
                    individual,
                    sheets_ref,
                    config_ref,
                    cache_ref,
                    clip_ref,
                    stop_ref,
                    |fraction| progress_cb(NestProgress { nest_index: idx, fraction }),
                );
                match result {
                    Ok(Some(place_result)) => {
                        log::info!("individual {idx}: placed onto {} sheet(s), fitness {:.3}", place_result.placements.len(), place_result.fitness);
                        let fitness = place_result.fitness;
                        if fitness < best_fitness {
                            best_fitness = fitness;
                            best_history.insert(0, place_result);
                            best_history.truncate(5);
                            progress_cb(NestProgress { nest_index: idx, fraction: -1.0 });
                        }
                        fitness
                    }
                    Ok(None) => {
                        log::warn!("individual {idx}: placer found nowhere to start");
                        1e12
                    }
                    Err(NestError::Cancelled) => f64::MAX,
                    Err(err) => {
                        log::warn!("individual {idx}: {err}");
                        1e12
                    }
                }
            },
            &mut rng,
        );

        if let Some(best) = ga.best() {
            log::info!("generation complete: best fitness = {:.3}", best.fitness.unwrap_or(f64::MAX));
        }
        status.set(true, format!("evaluated generation producing nest {nest_index}"));
    }

    status.set(false, "stopped");
    result_cb(NestComplete { results: best_history });
}
