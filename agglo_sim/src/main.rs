//! Agglo Simulator CLI
//!
//! Run occupancy experiments over simulated crowds.

use agglo_core::IndexStrategy;
use agglo_sim::{DensityExport, DensityFrame, ExperimentConfig, ExperimentResult, ExperimentRunner, ScenarioId, SimError};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Largest tolerated deviation between grid mass and contributing devices.
const MASS_TOLERANCE: f64 = 1e-6;

/// Seed used when neither `--seed` nor the config file names one.
const DEFAULT_SEED: u64 = 42;

/// Agglo occupancy experiment CLI
#[derive(Parser, Debug)]
#[command(name = "agglo-sim")]
#[command(about = "Run occupancy and density experiments over simulated devices", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time) [default: 42, or the config file's seed]
    #[arg(short, long)]
    seed: Option<u64>,

    /// Scenario preset (agglo, experiment, profile, wall_close)
    #[arg(short = 'S', long, default_value = "agglo")]
    scenario: String,

    /// Number of simulated devices
    #[arg(short, long)]
    devices: Option<usize>,

    /// Grid cells as ROWSxCOLUMNS or a single side length
    #[arg(short, long)]
    cells: Option<String>,

    /// Candidate index (scan, bbox, quadtree)
    #[arg(long)]
    strategy: Option<IndexStrategy>,

    /// Dedicated worker threads for parallel updates
    #[arg(short, long, conflicts_with = "sequential")]
    workers: Option<usize>,

    /// Run updates on a single thread
    #[arg(long)]
    sequential: bool,

    /// Maximum number of updates
    #[arg(long)]
    steps: Option<u64>,

    /// JSON experiment config (replaces the scenario preset)
    #[arg(long)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export occupancy and density frames to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn parse_cells(value: &str) -> Result<(usize, usize), SimError> {
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|e| SimError::config(format!("invalid cell count '{}': {}", s, e)))
    };

    match value.split_once(['x', 'X']) {
        Some((rows, columns)) => Ok((parse(rows)?, parse(columns)?)),
        None => {
            let side = parse(value)?;
            Ok((side, side))
        }
    }
}

/// Seed 0 asks for a time-derived seed.
fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

/// Name reported for the run: the config file when one is given, else the scenario.
fn run_label(args: &Args, scenario: ScenarioId) -> String {
    match &args.config {
        Some(path) => format!("config:{}", path),
        None => scenario.name().to_string(),
    }
}

fn build_config(args: &Args, scenario: ScenarioId) -> Result<ExperimentConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => scenario.config(DEFAULT_SEED),
    };

    if let Some(seed) = args.seed {
        config = config.with_seed(resolve_seed(seed));
    }

    if let Some(devices) = args.devices {
        config = config.with_devices(devices);
    }
    if let Some(cells) = &args.cells {
        let (rows, columns) = parse_cells(cells)?;
        config = config.with_cells(rows, columns);
    }
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(strategy);
    }
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if args.sequential {
        config = config.sequential();
    }
    if let Some(steps) = args.steps {
        config = config.with_max_steps(steps);
    }

    Ok(config)
}

fn run(args: &Args, scenario: ScenarioId, label: &str) -> Result<ExperimentResult, SimError> {
    let config = build_config(args, scenario)?;
    let seed = config.seed;
    let runner = ExperimentRunner::new(config)?;

    let Some(export_path) = &args.export else {
        return runner.run();
    };

    info!("Running with export to: {}", export_path);

    let mut export: Option<DensityExport> = None;
    let result = runner.run_with(|snapshot, engine| {
        export
            .get_or_insert_with(|| DensityExport::new(label, seed, engine))
            .add_frame(DensityFrame::capture(snapshot, engine));
    })?;

    if let Some(export) = export {
        export.write_to_file(export_path)?;
        info!("Exported {} frames to {}", export.frames.len(), export_path);
    }

    Ok(result)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Agglo Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenario: ScenarioId = args.scenario.parse().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Available scenarios: agglo, experiment, profile, wall_close");
        std::process::exit(1);
    });

    let label = run_label(&args, scenario);

    let result = match run(&args, scenario, &label) {
        Ok(result) => result,
        Err(e) => {
            error!("✗ {} FAILED: {}", label, e);
            std::process::exit(1);
        }
    };

    let passed = result.max_mass_error <= MASS_TOLERANCE;

    if args.json {
        let summary = serde_json::json!({
            "scenario": label,
            "passed": passed,
            "result": result,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("Iterations: {}", result.iterations);
        info!("Avg. matrix computation time: {:.4} s", result.avg_update_secs);
        info!("Avg. density: {:.5} devices/m^2", result.average_density);

        if result.no_coverage_total > 0 {
            info!("Devices without coverage: {}", result.no_coverage_total);
        }

        if passed {
            info!("✓ {} (seed={}) PASSED", label, result.seed);
        } else {
            error!(
                "✗ {} (seed={}) FAILED: mass error {:.3e} exceeds tolerance",
                label,
                result.seed,
                result.max_mass_error
            );
        }
    }

    // Exit with proper code for CI
    if !passed {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cells() {
        assert_eq!(parse_cells("6x8").unwrap(), (6, 8));
        assert_eq!(parse_cells("16").unwrap(), (16, 16));
        assert_eq!(parse_cells("4 X 2").unwrap(), (4, 2));
        assert!(parse_cells("ax2").is_err());
    }

    #[test]
    fn test_overrides_apply_over_preset() {
        let args = Args::parse_from([
            "agglo-sim", "--devices", "7", "--cells", "8", "--strategy", "quadtree", "--steps", "2", "--sequential",
        ]);
        let config = build_config(&args, ScenarioId::Agglo).unwrap();

        assert_eq!(config.devices, 7);
        assert_eq!(config.cells, (8, 8));
        assert_eq!(config.strategy, IndexStrategy::Quadtree);
        assert_eq!(config.max_steps, Some(2));
        assert!(!config.parallel);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(run_label(&args, ScenarioId::Agglo), "agglo");

        let args = Args::parse_from(["agglo-sim", "--seed", "5"]);
        assert_eq!(build_config(&args, ScenarioId::Agglo).unwrap().seed, 5);
    }

    #[test]
    fn test_config_file_keeps_its_seed() {
        let path = std::env::temp_dir().join(format!("agglo_cli_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "seed": 7, "devices": 3 }"#).unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let args = Args::parse_from(["agglo-sim", "--config", path_arg.as_str()]);
        let config = build_config(&args, ScenarioId::Agglo).unwrap();
        assert_eq!((config.seed, config.devices), (7, 3));
        assert_eq!(run_label(&args, ScenarioId::Agglo), format!("config:{}", path_arg));

        let args = Args::parse_from(["agglo-sim", "--config", path_arg.as_str(), "--seed", "9"]);
        assert_eq!(build_config(&args, ScenarioId::Agglo).unwrap().seed, 9);

        std::fs::remove_file(&path).unwrap();
    }
}
