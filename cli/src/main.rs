//! event-queue - run the wolf-sheep demo on the event-queue engine
//!
//! Prints one JSON line per sample interval with the population and grass
//! levels, then a summary line with the scheduler counters.

mod model;

use std::env;
use std::fs;

use event_queue_core_rs::{Simulation, SimulationConfig, SimulationError, StopReason};
use model::{build_registry, Animal, Pasture, PredationParams};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Contents of a demo config file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DemoConfig {
    simulation: SimulationConfig,
    #[serde(default)]
    model: PredationParams,
    #[serde(default = "default_duration")]
    duration: f64,
    #[serde(default = "default_sample_every")]
    sample_every: f64,
}

fn default_duration() -> f64 {
    100.0
}

fn default_sample_every() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
struct Sample {
    time: f64,
    sheep: usize,
    wolves: usize,
    grass: f64,
    pending: usize,
}

fn print_usage() {
    println!("event-queue <command>");
    println!("commands:");
    println!("  run [seed] [duration] [sample_every]");
    println!("    runs the wolf-sheep demo with default rates");
    println!("  config <path.json> [snapshot_out.json]");
    println!("    runs the demo described by a JSON config, optionally saving a snapshot");
    println!("  print-config [seed]");
    println!("    prints a default config to start from");
    println!("logging: set RUST_LOG (e.g. RUST_LOG=event_queue_core_rs=debug)");
}

fn parse_arg<T: std::str::FromStr>(value: Option<&String>, label: &str, default: T) -> Result<T, String> {
    match value {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("invalid {}: {}", label, raw)),
        None => Ok(default),
    }
}

fn default_config(seed: u64) -> DemoConfig {
    DemoConfig {
        simulation: SimulationConfig::new(seed),
        model: PredationParams::default(),
        duration: default_duration(),
        sample_every: default_sample_every(),
    }
}

fn load_config(path: &str) -> Result<DemoConfig, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("failed to read {path}: {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid config {path}: {err}"))
}

fn sample(sim: &Simulation<Animal, Pasture>) -> Sample {
    let model = sim.model();
    let (sheep, wolves) = match (sim.kind_id("sheep"), sim.kind_id("wolf")) {
        (Some(sheep), Some(wolf)) => (model.count_kind(sheep), model.count_kind(wolf)),
        _ => (0, 0),
    };
    Sample {
        time: sim.current_time(),
        sheep,
        wolves,
        grass: model.properties().grass_at(sim.current_time()),
        pending: sim.pending_event_count(),
    }
}

fn emit<T: Serialize>(value: &T) -> Result<(), String> {
    let line = serde_json::to_string(value).map_err(|err| format!("failed to encode output: {err}"))?;
    println!("{line}");
    Ok(())
}

fn simulate(config: DemoConfig, snapshot_path: Option<&String>) -> Result<(), String> {
    if !(config.sample_every > 0.0) || !(config.duration >= 0.0) {
        return Err("duration must be non-negative and sample_every positive".to_string());
    }

    let (registry, species) = build_registry().map_err(|err| err.to_string())?;
    let params = config.model.clone();
    let mut sim = Simulation::new(config.simulation.clone(), registry, Pasture::new(params.clone()))
        .map_err(|err| err.to_string())?;

    let populate = |sim: &mut Simulation<Animal, Pasture>| -> Result<(), SimulationError> {
        for _ in 0..params.initial_sheep {
            sim.add_agent(species.sheep, Animal { energy: params.initial_energy })?;
        }
        for _ in 0..params.initial_wolves {
            sim.add_agent(species.wolf, Animal { energy: params.initial_energy })?;
        }
        Ok(())
    };
    populate(&mut sim).map_err(|err| err.to_string())?;
    info!(
        seed = config.simulation.rng_seed,
        sheep = params.initial_sheep,
        wolves = params.initial_wolves,
        "population created"
    );

    emit(&sample(&sim))?;

    let end = sim.current_time() + config.duration;
    let limit = params.population_limit;
    let mut reason = StopReason::BudgetExhausted;
    // Sample on a fixed grid; the clock itself only lands on event times
    let mut next_sample = sim.current_time() + config.sample_every;
    while next_sample <= end {
        let budget = next_sample - sim.current_time();
        let summary = sim
            .run_until(budget, |model, _| {
                model.count_kind(species.sheep) == 0
                    || model.count_kind(species.wolf) == 0
                    || model.count() > limit
            })
            .map_err(|err| err.to_string())?;

        let mut row = sample(&sim);
        row.time = if summary.reason == StopReason::PredicateSatisfied {
            sim.current_time()
        } else {
            next_sample
        };
        emit(&row)?;

        if summary.reason != StopReason::BudgetExhausted {
            reason = summary.reason;
            break;
        }
        next_sample += config.sample_every;
    }

    info!(reason = ?reason, time = sim.current_time(), "demo finished");
    emit(&sim.stats())?;

    if let Some(path) = snapshot_path {
        let json = sim
            .snapshot()
            .and_then(|snapshot| snapshot.to_json())
            .map_err(|err| err.to_string())?;
        fs::write(path, json).map_err(|err| format!("failed to write {path}: {err}"))?;
        info!(path = path.as_str(), "snapshot written");
    }
    Ok(())
}

fn run_command(args: &[String]) -> Result<(), String> {
    match args.get(1).map(String::as_str) {
        Some("run") => {
            let seed = parse_arg(args.get(2), "seed", 42u64)?;
            let mut config = default_config(seed);
            config.duration = parse_arg(args.get(3), "duration", config.duration)?;
            config.sample_every = parse_arg(args.get(4), "sample_every", config.sample_every)?;
            simulate(config, None)
        }
        Some("config") => {
            let path = args.get(2).ok_or_else(|| "missing config path".to_string())?;
            simulate(load_config(path)?, args.get(3))
        }
        Some("print-config") => {
            let seed = parse_arg(args.get(2), "seed", 42u64)?;
            let json = serde_json::to_string_pretty(&default_config(seed))
                .map_err(|err| format!("failed to encode config: {err}"))?;
            println!("{json}");
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if let Err(err) = run_command(&args) {
        eprintln!("error: {err}");
        print_usage();
        std::process::exit(2);
    }
}
