//! vnet Simulator CLI
//!
//! Route payloads over an emulated ring, torus or hypercube and verify the
//! results.
//!
//! # Example
//!
//! ```bash
//! # Scenario from the docs: ring of 4, rank 0 to rank 3
//! vnet-sim --topology ring --ranks 4 --source 0 --destination 3 --payload-len 1
//!
//! # 50 random routes on a 4x4 torus, reproducible
//! vnet-sim --topology torus:4x4 --ranks 16 --trials 50 --seed 7
//!
//! # Hypercube with dimension-exchange result dissemination, JSON report
//! vnet-sim --topology hypercube --ranks 32 --trials 10 --dissemination exchange --json
//! ```

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vnet_router::{Dissemination, RouterConfig};
use vnet_simulator::{Simulator, SimulatorConfig};
use vnet_topology::TopologySpec;

/// vnet Simulator
///
/// Runs every rank of the world as a thread and routes seeded payloads
/// between them. Exits with status 1 when any trial fails verification.
#[derive(Parser, Debug)]
#[command(name = "vnet-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Topology: ring, torus, torus:RxC or hypercube
    #[arg(short = 't', long, default_value = "ring")]
    topology: TopologySpec,

    /// Number of ranks in the world
    #[arg(short = 'n', long, default_value = "4")]
    ranks: u32,

    /// Source rank. Random per trial when omitted.
    #[arg(short = 's', long)]
    source: Option<u32>,

    /// Destination rank. Random per trial when omitted.
    #[arg(short = 'd', long)]
    destination: Option<u32>,

    /// Number of i32 values per payload
    #[arg(short = 'l', long, default_value = "4")]
    payload_len: usize,

    /// Number of routing operations
    #[arg(long, default_value = "1")]
    trials: usize,

    /// Random seed for reproducible results. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// How the result reaches every rank: chain or dimension-exchange
    #[arg(long, default_value = "chain")]
    dissemination: Dissemination,

    /// Rank whose request is authoritative
    #[arg(long, default_value = "0")]
    owner: u32,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,vnet_simulator=info")),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    info!(
        topology = %args.topology,
        ranks = args.ranks,
        trials = args.trials,
        seed,
        dissemination = %args.dissemination,
        "Starting vnet-sim"
    );

    let router = RouterConfig::new()
        .with_request_owner(args.owner)
        .with_dissemination(args.dissemination);
    let mut config = SimulatorConfig::new(args.topology, args.ranks)
        .with_payload_len(args.payload_len)
        .with_trials(args.trials)
        .with_seed(seed)
        .with_router(router);
    if let Some(source) = args.source {
        config = config.with_source(source);
    }
    if let Some(destination) = args.destination {
        config = config.with_destination(destination);
    }

    let report = match Simulator::new(config).and_then(|mut simulator| simulator.run()) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Simulation failed");
            return ExitCode::FAILURE;
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!(error = %e, "Failed to serialize report");
                return ExitCode::FAILURE;
            }
        }
    } else {
        report.print_summary();
    }

    if report.all_verified() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
