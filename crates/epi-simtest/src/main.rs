//! Epi Headless Simulation Harness
//!
//! Drives the engine for a fixed number of ticks without any renderer and
//! checks the population invariants after every tick.
//!
//! Usage:
//!   cargo run -p epi-simtest
//!   cargo run -p epi-simtest -- --config data/reference.json --ticks 2000 --dt 0.5
//!   cargo run -p epi-simtest -- --verbose --curve curve.json

use std::path::PathBuf;

use clap::Parser;
use epi_core::prelude::*;
use log::{error, info, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

// ISO 8601 timestamp and colour coded level
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

#[derive(Parser, Debug)]
#[command(name = "epi-simtest")]
#[command(about = "Run an epidemic headless and validate its invariants")]
struct Args {
    /// JSON simulation config; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(short, long, default_value = "1000")]
    ticks: u64,

    /// Simulated seconds per tick
    #[arg(long, default_value = "1.0")]
    dt: f64,

    /// Override the config's random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the epidemic curve every this many ticks
    #[arg(long, default_value = "50")]
    report_every: u64,

    /// Write the recorded count history to this file as JSON
    #[arg(long)]
    curve: Option<PathBuf>,

    /// Write a checkpoint of the final state to this file
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Debug logging and every check listed
    #[arg(short, long)]
    verbose: bool,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Logging disabled: {}", e);
    }
    println!("=== Epi Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration
    let config = match load_config(&args, &mut results) {
        Some(config) => config,
        None => finish(&results, args.verbose),
    };

    // 2. Construction
    let mut sim = match build_simulator(&config, &mut results) {
        Some(sim) => sim,
        None => finish(&results, args.verbose),
    };

    // 3. Tick loop with per-tick invariants
    results.extend(run_ticks(&mut sim, &config, &args));

    if let Some(path) = &args.curve {
        let curve: Vec<&StatusCounts> = sim.history().iter().collect();
        let written = serde_json::to_string_pretty(&curve)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        results.push(TestResult {
            name: "curve_written".into(),
            passed: written.is_ok(),
            detail: match written {
                Ok(()) => format!("{} snapshots to {}", curve.len(), path.display()),
                Err(e) => e,
            },
        });
    }

    // 4. Checkpoint resume; ticks the live simulator further
    results.extend(validate_checkpoint(&mut sim, &args));

    finish(&results, args.verbose)
}

/// Print the summary and exit with the harness status
fn finish(results: &[TestResult], verbose: bool) -> ! {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    std::process::exit(if failed > 0 { 1 } else { 0 });
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn load_config(args: &Args, results: &mut Vec<TestResult>) -> Option<SimulationConfig> {
    println!("--- Configuration ---");
    let loaded = match &args.config {
        Some(path) => SimulationConfig::from_path(path),
        None => Ok(SimulationConfig::default()),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            results.push(TestResult {
                name: "config_load".into(),
                passed: false,
                detail: e.to_string(),
            });
            return None;
        }
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    results.push(TestResult {
        name: "config_load".into(),
        passed: true,
        detail: format!(
            "{} humans, {} infected, {:?}, seed {}",
            config.world.population_size, config.initial_infected, config.transmission, config.seed
        ),
    });

    let dt_ok = args.dt.is_finite() && args.dt > 0.0;
    results.push(TestResult {
        name: "config_tick_size".into(),
        passed: dt_ok,
        detail: format!("dt = {}s", args.dt),
    });
    dt_ok.then_some(config)
}

// ── 2. Construction ─────────────────────────────────────────────────────

fn build_simulator(config: &SimulationConfig, results: &mut Vec<TestResult>) -> Option<Simulator> {
    println!("--- Construction ---");
    let sim = match Simulator::from_config(config) {
        Ok(sim) => sim,
        Err(e) => {
            results.push(TestResult {
                name: "simulator_build".into(),
                passed: false,
                detail: e.to_string(),
            });
            return None;
        }
    };

    let counts = sim.counts();
    results.push(TestResult {
        name: "initial_population".into(),
        passed: counts.total() == config.world.population_size,
        detail: format!("{} humans placed", counts.total()),
    });
    results.push(TestResult {
        name: "initial_seeding".into(),
        passed: counts.infected == config.initial_infected
            && counts.recovered == config.initial_recovered,
        detail: format!(
            "{} infected, {} recovered, {} healthy",
            counts.infected, counts.recovered, counts.healthy
        ),
    });
    results.push(TestResult {
        name: "initial_partition".into(),
        passed: sim.world().check_partition().is_ok(),
        detail: format!("{} locations", sim.world().locations().len()),
    });
    Some(sim)
}

// ── 3. Tick loop ────────────────────────────────────────────────────────

fn run_ticks(sim: &mut Simulator, config: &SimulationConfig, args: &Args) -> Vec<TestResult> {
    println!("--- Run: {} ticks of {}s ---", args.ticks, args.dt);
    let mut results = Vec::new();
    let population = config.world.population_size;

    let mut tick_errors = Vec::new();
    let mut conservation_breaks = 0;
    let mut partition_breaks = 0;
    let mut status_breaks = 0;
    let mut peak = sim.counts();
    let mut extinct_at = None;

    println!("  {:>6} {:>9} {:>8} {:>8} {:>9} {:>8}", "tick", "time", "healthy", "infected", "recovered", "deceased");
    for _ in 0..args.ticks {
        let counts = match sim.tick(args.dt) {
            Ok(counts) => counts,
            Err(e) => {
                tick_errors.push(format!("tick {}: {}", sim.tick_count() + 1, e));
                break;
            }
        };

        if counts.total() + counts.deceased != population {
            conservation_breaks += 1;
        }
        if sim.world().check_partition().is_err() {
            partition_breaks += 1;
        }
        let inconsistent = sim
            .world()
            .humans()
            .iter()
            .filter(|v| sim.world().human(v.entity).map_or(true, |h| !h.status_consistent()))
            .count();
        status_breaks += inconsistent;

        if counts.infected > peak.infected {
            peak = counts;
        }
        if counts.infected == 0 && extinct_at.is_none() {
            extinct_at = Some(counts.time);
        }
        if args.report_every > 0 && counts.tick % args.report_every == 0 {
            println!(
                "  {:>6} {:>9.1} {:>8} {:>8} {:>9} {:>8}",
                counts.tick, counts.time, counts.healthy, counts.infected, counts.recovered, counts.deceased
            );
        }
    }

    results.push(TestResult {
        name: "ticks_completed".into(),
        passed: tick_errors.is_empty(),
        detail: if tick_errors.is_empty() {
            format!("{} ticks, {:.1}s simulated", sim.tick_count(), sim.elapsed())
        } else {
            tick_errors.join("; ")
        },
    });
    results.push(TestResult {
        name: "population_conserved".into(),
        passed: conservation_breaks == 0,
        detail: format!("{} ticks with living + deceased != {}", conservation_breaks, population),
    });
    results.push(TestResult {
        name: "location_partition".into(),
        passed: partition_breaks == 0,
        detail: format!("{} ticks with a broken partition", partition_breaks),
    });
    results.push(TestResult {
        name: "status_consistent".into(),
        passed: status_breaks == 0,
        detail: format!("{} inconsistent statuses observed", status_breaks),
    });

    let last = sim.counts();
    info!(
        "Peak of {} infected at t={:.1}s; final {} healthy, {} recovered, {} deceased",
        peak.infected, peak.time, last.healthy, last.recovered, last.deceased
    );
    results.push(TestResult {
        name: "epidemic_over".into(),
        passed: last.infected == 0,
        detail: match extinct_at {
            Some(t) => format!("no infected left after {:.1}s (peak {} at {:.1}s)", t, peak.infected, peak.time),
            None => format!("{} still infected at {:.1}s", last.infected, last.time),
        },
    });
    results
}

// ── 4. Checkpoint ───────────────────────────────────────────────────────

fn validate_checkpoint(sim: &mut Simulator, args: &Args) -> Vec<TestResult> {
    println!("--- Checkpoint ---");
    let mut results = Vec::new();

    let mut buffer = Vec::new();
    if let Err(e) = sim.save(&mut buffer) {
        results.push(TestResult {
            name: "checkpoint_save".into(),
            passed: false,
            detail: e.to_string(),
        });
        return results;
    }
    results.push(TestResult {
        name: "checkpoint_save".into(),
        passed: true,
        detail: format!("{} bytes", buffer.len()),
    });

    if let Some(path) = &args.checkpoint {
        let written = std::fs::File::create(path)
            .map_err(|e| e.to_string())
            .and_then(|file| sim.save(std::io::BufWriter::new(file)).map_err(|e| e.to_string()));
        results.push(TestResult {
            name: "checkpoint_written".into(),
            passed: written.is_ok(),
            detail: match written {
                Ok(()) => path.display().to_string(),
                Err(e) => e,
            },
        });
    }
    let resumed = Simulator::load(&buffer[..]);
    let mut resumed = match resumed {
        Ok(resumed) => resumed,
        Err(e) => {
            results.push(TestResult {
                name: "checkpoint_load".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };
    results.push(TestResult {
        name: "checkpoint_load".into(),
        passed: resumed.counts() == sim.counts() && resumed.tick_count() == sim.tick_count(),
        detail: format!("resumed at tick {}", resumed.tick_count()),
    });

    // Both copies must evolve identically from here
    let mut diverged = None;
    for _ in 0..10 {
        match (sim.tick(args.dt), resumed.tick(args.dt)) {
            (Ok(a), Ok(b)) if a == b => {}
            (a, b) => {
                diverged = Some(format!("{:?} vs {:?}", a, b));
                break;
            }
        }
    }
    results.push(TestResult {
        name: "checkpoint_resume".into(),
        passed: diverged.is_none(),
        detail: diverged.unwrap_or_else(|| "10 ticks identical after reload".into()),
    });

    results
}
