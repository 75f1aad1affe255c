//! CLI demonstrating the public `start`/`stop` API end to end: load one
//! sheet and a handful of parts from SVG/DXF files, run the GA for a
//! bounded number of generations, and write the best placement found to
//! an SVG file.
//!
//! `--config <FILE>` loads a JSON `Config` the CLI flags then overlay
//! (CLI flags win), and `--dump-config` prints the resolved `Config` as
//! JSON instead of running a nest, so a host can save a preset back out.

use clap::Parser;
use deepnest_engine::config::PlacementType;
use deepnest_engine::part::{PartSpec, Polygon, SheetSpec};
use deepnest_engine::{Config, NestProgress};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum PlacementArg {
    Gravity,
    Box,
    Convexhull,
}

impl From<PlacementArg> for PlacementType {
    fn from(v: PlacementArg) -> Self {
        match v {
            PlacementArg::Gravity => PlacementType::Gravity,
            PlacementArg::Box => PlacementType::Box,
            PlacementArg::Convexhull => PlacementType::ConvexHull,
        }
    }
}

/// Command line arguments for the nesting CLI.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Input SVG/DXF files: the first is the sheet, the rest are one part
    /// each (quantity 1).
    #[arg(long, value_name = "FILES", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Load a base `Config` from this JSON file; any CLI flag below
    /// overrides the matching field.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the resolved `Config` as JSON instead of nesting.
    #[arg(long)]
    pub dump_config: bool,

    /// Extra offset between parts.
    #[arg(long)]
    pub spacing: Option<f64>,

    /// Polyline simplification tolerance.
    #[arg(long = "curve-tolerance")]
    pub curve_tolerance: Option<f64>,

    /// Number of discrete rotations to try per part.
    #[arg(long)]
    pub rotations: Option<u32>,

    /// GA population size.
    #[arg(long = "population-size", value_name = "SIZE")]
    pub population_size: Option<u32>,

    /// Per-gene mutation chance, 0-100.
    #[arg(long = "mutation-rate", value_name = "RATE")]
    pub mutation_rate: Option<u8>,

    /// Worker pool size.
    #[arg(long)]
    pub threads: Option<u32>,

    /// Placement scoring strategy.
    #[arg(long = "placement-type", value_enum)]
    pub placement_type: Option<PlacementArg>,

    /// Enable the shared cut-line merge bonus.
    #[arg(long = "merge-lines")]
    pub merge_lines: bool,

    /// Weight of the merged-line bonus against area, in [0,1].
    #[arg(long = "time-ratio")]
    pub time_ratio: Option<f64>,

    /// Drop part holes before pairwise NFP precomputation.
    #[arg(long)]
    pub simplify: bool,

    /// Try placing parts inside the holes of already-placed parts.
    /// Pass `false` to disable when a loaded `--config` enables it.
    #[arg(long = "use-holes", value_name = "BOOL")]
    pub use_holes: Option<bool>,

    /// Number of GA generations to run before reporting the best result.
    #[arg(long, default_value_t = 10)]
    pub generations: u32,

    /// Output SVG file.
    #[arg(long, default_value = "nested.svg")]
    pub output: PathBuf,
}

fn load_base_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(p) => {
            let data = std::fs::read_to_string(p)?;
            Ok(serde_json::from_str(&data)?)
        }
        None => Ok(Config::default()),
    }
}

fn apply_overlay(mut cfg: Config, args: &CliArgs) -> Config {
    if let Some(v) = args.spacing {
        cfg.spacing = v;
    }
    if let Some(v) = args.curve_tolerance {
        cfg.curve_tolerance = v;
    }
    if let Some(v) = args.rotations {
        cfg.rotations = v;
    }
    if let Some(v) = args.population_size {
        cfg.population_size = v;
    }
    if let Some(v) = args.mutation_rate {
        cfg.mutation_rate = v;
    }
    if let Some(v) = args.threads {
        cfg.threads = v;
    }
    if let Some(v) = args.placement_type {
        cfg.placement_type = v.into();
    }
    if args.merge_lines {
        cfg.merge_lines = true;
    }
    if let Some(v) = args.time_ratio {
        cfg.time_ratio = v;
    }
    if args.simplify {
        cfg.simplify = true;
    }
    if let Some(v) = args.use_holes {
        cfg.use_holes = v;
    }
    cfg
}

fn part_from_path(path: &PathBuf, source: u32) -> anyhow::Result<Polygon> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("dxf") {
        #[cfg(feature = "dxf")]
        {
            deepnest_engine::dxf_parser::part_from_file(path, source)
        }
        #[cfg(not(feature = "dxf"))]
        {
            anyhow::bail!("DXF support not enabled (source {})", source)
        }
    } else {
        deepnest_engine::svg_parser::part_from_file(path, source)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();

    let base = load_base_config(args.config.as_ref())?;
    let config = apply_overlay(base, &args);

    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let (sheet_path, part_paths) = args.inputs.split_first().expect("clap enforces at least one input");
    if part_paths.is_empty() {
        anyhow::bail!("at least one part file is required in addition to the sheet");
    }

    let sheet_poly = match part_from_path(sheet_path, 0) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to parse sheet {}: {}", sheet_path.display(), e);
            return Ok(());
        }
    };
    let sheet = SheetSpec::new(0, sheet_poly);

    let mut parts = Vec::new();
    for (i, path) in part_paths.iter().enumerate() {
        let source = (i + 1) as u32;
        match part_from_path(path, source) {
            Ok(poly) => parts.push(PartSpec::new(source, poly, 1)),
            Err(e) => {
                eprintln!("Failed to parse {}: {}", path.display(), e);
                return Ok(());
            }
        }
    }
    let parts_by_source: std::collections::HashMap<u32, Polygon> = parts.iter().map(|p| (p.source, p.polygon.clone())).collect();

    // Generation 1 evaluates the whole population (no individual starts
    // with a cached fitness); every generation after that only evaluates
    // the non-elite slots, since the elite survives with its fitness
    // already set (see `GeneticAlgorithm::generation`).
    let pop = config.population_size.max(1) as u64;
    let generations = args.generations.max(1) as u64;
    let target_individuals = pop + (generations - 1) * pop.saturating_sub(1);
    let evaluated_max = Arc::new(AtomicU64::new(0));
    let evaluated_cb = Arc::clone(&evaluated_max);
    let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);

    let results = Arc::new(Mutex::new(Vec::new()));
    let results_cb = Arc::clone(&results);

    let mut handle = match deepnest_engine::start(
        config,
        parts,
        vec![sheet],
        move |progress: NestProgress| {
            let seen = evaluated_cb.fetch_max(progress.nest_index, Ordering::SeqCst).max(progress.nest_index);
            if seen >= target_individuals {
                let _ = done_tx.try_send(());
            }
        },
        move |complete| {
            *results_cb.lock().expect("results mutex poisoned") = complete.results;
        },
    ) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Failed to start nesting: {}", e);
            return Ok(());
        }
    };

    let _ = done_rx.recv_timeout(Duration::from_secs(120));
    handle.stop();
    handle.join();

    let best = {
        let guard = results.lock().expect("results mutex poisoned");
        guard.first().cloned()
    };

    let Some(best) = best else {
        eprintln!("No placement found");
        return Ok(());
    };

    let svg = render_svg(&best, &parts_by_source);
    std::fs::write(&args.output, svg)?;
    println!("Nested result written to {}", args.output.display());
    Ok(())
}

/// Renders the best [`deepnest_engine::PlaceResult`] as a minimal SVG:
/// one `<svg>` per sheet, one `<polygon>` per placement, reconstructed
/// from each part's base geometry via the same rotate-then-translate
/// recipe the placer itself uses. This is the CLI's own thin exporter,
/// not a general one — the engine only supplies geometric data.
fn render_svg(result: &deepnest_engine::PlaceResult, parts_by_source: &std::collections::HashMap<u32, Polygon>) -> String {
    let mut out = String::new();
    out.push_str("<svg xmlns=\"http://www.w3.org/2000/svg\">\n");
    for sheet in &result.placements {
        out.push_str("  <g class=\"sheet\">\n");
        for placement in &sheet.placements {
            let Some(base) = parts_by_source.get(&placement.source) else { continue };
            let rotated = base.rotate(placement.rotation - base.rotation);
            let Some(reference) = rotated.points.first().copied() else { continue };
            let world = rotated.translate(placement.x - reference.x, placement.y - reference.y);
            let pts: Vec<String> = world.points.iter().map(|p| format!("{:.4},{:.4}", p.x, p.y)).collect();
            out.push_str(&format!("    <polygon points=\"{}\" data-source=\"{}\" data-id=\"{}\"/>\n", pts.join(" "), placement.source, placement.id));
        }
        out.push_str("  </g>\n");
    }
    out.push_str("</svg>\n");
    out
}
