//! Simulation results.

use serde::Serialize;
use vnet_network_memory::TrafficReport;
use vnet_router::Dissemination;
use vnet_types::{Rank, RouteOutcome};

/// Result of one routing trial.
#[derive(Debug, Clone, Serialize)]
pub struct TrialReport {
    pub trial: usize,
    pub source: Rank,
    pub destination: Rank,
    pub payload_len: usize,
    /// The outcome every rank agreed on (rank 0's copy).
    pub outcome: RouteOutcome,
    /// Point-to-point messages sent during this trial.
    pub point_to_point_messages: u64,
    /// Why verification failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl TrialReport {
    pub fn verified(&self) -> bool {
        self.failure.is_none()
    }

    /// Hop count of the delivered path.
    pub fn hops(&self) -> Option<usize> {
        self.outcome.result().map(|r| r.path.hops())
    }
}

/// Result of a whole simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Resolved topology, or the requested one when it does not fit.
    pub topology: String,
    pub world_size: u32,
    pub seed: u64,
    pub dissemination: Dissemination,
    pub trials: Vec<TrialReport>,
    pub traffic: TrafficReport,
}

impl SimulationReport {
    pub fn delivered(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.outcome.is_delivered())
            .count()
    }

    pub fn declined(&self) -> usize {
        self.trials.len() - self.delivered()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TrialReport> {
        self.trials.iter().filter(|t| !t.verified())
    }

    pub fn all_verified(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Mean hop count over delivered trials.
    pub fn average_hops(&self) -> f64 {
        let hops: Vec<usize> = self.trials.iter().filter_map(TrialReport::hops).collect();
        if hops.is_empty() {
            return 0.0;
        }
        hops.iter().sum::<usize>() as f64 / hops.len() as f64
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!();
        println!("===================== SIMULATION SUMMARY =====================");
        println!("Topology:         {}", self.topology);
        println!("World size:       {}", self.world_size);
        println!("Seed:             {}", self.seed);
        println!("Dissemination:    {}", self.dissemination);
        println!(
            "Trials:           {} ({} delivered, {} declined)",
            self.trials.len(),
            self.delivered(),
            self.declined()
        );
        println!("Average hops:     {:.2}", self.average_hops());
        println!();

        for trial in &self.trials {
            let status = match &trial.outcome {
                RouteOutcome::Delivered(result) => format!("path {}", result.path),
                RouteOutcome::Declined { reason, .. } => format!("declined: {reason}"),
            };
            let mark = if trial.verified() { "ok" } else { "FAILED" };
            println!(
                "  #{:<4} {:>4} -> {:<4} len={:<5} {:<6} {}",
                trial.trial, trial.source, trial.destination, trial.payload_len, mark, status
            );
            if let Some(failure) = &trial.failure {
                println!("         {failure}");
            }
        }

        self.traffic.print_summary();
    }
}
