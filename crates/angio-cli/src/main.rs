//! Vascular network simulator CLI.
//!
//! Provides the `angio` binary with two subcommands: `solve` brings a
//! configured network to its initial hemodynamic state, and `run` also
//! drives the configured remodeling components for a number of ticks. Both
//! print the resulting network report as JSON on stdout; logs go to stderr
//! through `tracing`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::json;

use angio_sim::config::SimulationConfig;
use angio_sim::environment::CubicLattice;
use angio_sim::{SimError, Simulation, VascularNetwork};

/// Vascular hemodynamics and remodeling tools.
#[derive(Parser)]
#[command(name = "angio", about = "Vascular hemodynamics and remodeling tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Solve pressures, flows and perfusion for the configured network.
    Solve {
        /// Path to the JSON configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run the configured remodeling components.
    Run {
        /// Path to the JSON configuration file.
        #[arg(short, long)]
        config: PathBuf,

        /// Number of ticks to simulate.
        #[arg(short, long, default_value_t = 60)]
        ticks: u64,

        /// Random seed (default: the one in the configuration).
        #[arg(short, long)]
        seed: Option<u64>,
    },
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve { config } => run_solve(&config),
        Commands::Run {
            config,
            ticks,
            seed,
        } => run_simulation(&config, ticks, seed),
    };

    match result {
        Ok(output) => {
            let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| {
                format!("{{\"error\": \"failed to serialize result: {}\"}}", e)
            });
            println!("{}", json);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(exit_code(&e));
        }
    }
}

/// Exit code: 1 = invalid network or configuration, 3 = I/O error.
fn exit_code(error: &SimError) -> i32 {
    match error {
        SimError::Io(_) => 3,
        _ => 1,
    }
}

/// Execute the solve subcommand.
fn run_solve(path: &Path) -> Result<serde_json::Value, SimError> {
    let config = SimulationConfig::from_path(path)?;
    let lattice = CubicLattice::new(config.lattice);
    let mut network = VascularNetwork::from_spec(&config.network, &lattice)?;
    network.initialize();
    Ok(serde_json::to_value(network.report())?)
}

/// Execute the run subcommand.
fn run_simulation(path: &Path, ticks: u64, seed: Option<u64>) -> Result<serde_json::Value, SimError> {
    let mut config = SimulationConfig::from_path(path)?;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    let seed = config.seed;

    let mut sim = Simulation::from_config(config)?;
    tracing::info!(ticks, seed, "simulation starting");
    let changes = sim.run(ticks);

    Ok(json!({
        "ticks": sim.tick(),
        "seed": seed,
        "components": sim.summaries(),
        "changes": changes,
        "network": sim.network().report(),
    }))
}
