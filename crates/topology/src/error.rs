//! Topology errors.

use thiserror::Error;
use vnet_types::{DeclineReason, Rank};

/// Errors from topology construction and path planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("invalid {spec} shape for world size {world_size}: {reason}")]
    InvalidTopologyShape {
        spec: String,
        world_size: u32,
        reason: &'static str,
    },

    #[error("rank {rank} out of range for world size {world_size}")]
    OutOfRangeRank { rank: Rank, world_size: u32 },

    #[error("ranks {from} and {to} are not topology neighbors")]
    BrokenPath { from: Rank, to: Rank },

    #[error("path runs from {actual_source} to {actual_destination}, expected {expected_source} to {expected_destination}")]
    WrongEndpoints {
        expected_source: Rank,
        expected_destination: Rank,
        actual_source: Rank,
        actual_destination: Rank,
    },

    #[error("unknown topology: {0}")]
    UnknownTopology(String),
}

impl TopologyError {
    /// The decline reason a collective router reports for this error, if the
    /// error is one of the declinable precondition failures.
    pub fn decline_reason(&self) -> Option<DeclineReason> {
        match self {
            TopologyError::InvalidTopologyShape { .. } => Some(DeclineReason::InvalidTopologyShape),
            TopologyError::OutOfRangeRank { .. } => Some(DeclineReason::OutOfRangeRank),
            _ => None,
        }
    }
}
