//! Router errors.

use thiserror::Error;
use vnet_network::{CommError, WireError};
use vnet_topology::TopologyError;
use vnet_types::Rank;

/// Errors from a collective routing operation.
///
/// Invalid requests are not errors; they produce
/// [`RouteOutcome::Declined`](vnet_types::RouteOutcome::Declined). These
/// variants cover misuse and transport faults.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("communication failed: {0}")]
    Comm(#[from] CommError),

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("malformed message: {0}")]
    Wire(#[from] WireError),

    #[error("expected a {expected}-element payload, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("context says rank {ctx_rank}/{ctx_world}, communicator says {comm_rank}/{comm_world}")]
    ContextMismatch {
        ctx_rank: Rank,
        ctx_world: u32,
        comm_rank: Rank,
        comm_world: u32,
    },

    #[error("request owner {owner} is outside a world of {world_size}")]
    InvalidOwner { owner: Rank, world_size: u32 },

    #[error("unknown verdict code {0}")]
    UnknownVerdict(u64),

    #[error("broadcast result carried an empty path")]
    EmptyPath,
}
