//! Simulator configuration.

use serde::Serialize;
use vnet_router::RouterConfig;
use vnet_topology::TopologySpec;
use vnet_types::Rank;

/// Configuration for a [`Simulator`](crate::Simulator) run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Requested topology.
    pub topology: TopologySpec,

    /// Number of ranks in the world.
    pub world_size: u32,

    /// Fixed source rank. Drawn per trial when `None`.
    pub source: Option<Rank>,

    /// Fixed destination rank. Drawn per trial when `None`.
    pub destination: Option<Rank>,

    /// Number of `i32` values in each trial's payload.
    pub payload_len: usize,

    /// Number of routing operations to run.
    pub trials: usize,

    /// Seed for endpoints and payloads.
    pub seed: u64,

    /// Router settings shared by every rank.
    pub router: RouterConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            topology: TopologySpec::Ring,
            world_size: 4,
            source: None,
            destination: None,
            payload_len: 4,
            trials: 1,
            seed: 42,
            router: RouterConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Create a configuration for `topology` over `world_size` ranks.
    pub fn new(topology: TopologySpec, world_size: u32) -> Self {
        Self {
            topology,
            world_size,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: Rank) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_destination(mut self, destination: Rank) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_payload_len(mut self, payload_len: usize) -> Self {
        self.payload_len = payload_len;
        self
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }
}
