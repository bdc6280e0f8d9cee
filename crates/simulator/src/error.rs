use thiserror::Error;
use vnet_network_memory::WorldError;
use vnet_router::RouteError;
use vnet_types::Rank;

/// Errors that stop a simulation.
///
/// A trial that completes with the wrong result is not an error; it is
/// reported as a verification failure in the
/// [`SimulationReport`](crate::SimulationReport).
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("world error: {0}")]
    World(#[from] WorldError),

    #[error("rank {rank} failed in trial {trial}: {source}")]
    Route {
        trial: usize,
        rank: Rank,
        #[source]
        source: RouteError,
    },

    #[error("request owner {owner} is outside a world of {world_size}")]
    InvalidOwner { owner: Rank, world_size: u32 },
}
