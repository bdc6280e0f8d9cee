//! Rank identity and the per-call routing context.

use serde::Serialize;
use std::fmt;

/// A process's identity within the flat communicator, `0..world_size`.
pub type Rank = u32;

/// Who am I, and how many of us are there.
///
/// Constructed once by whatever drives the router and passed explicitly to
/// every routing call. Nothing in the workspace caches it as hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RoutingContext {
    /// This process's rank.
    pub rank: Rank,
    /// Number of ranks in the world.
    pub world_size: u32,
}

impl RoutingContext {
    /// Create a context for `rank` in a world of `world_size` ranks.
    pub fn new(rank: Rank, world_size: u32) -> Self {
        Self { rank, world_size }
    }

    /// Whether `rank` names a process in this world.
    pub fn contains(&self, rank: Rank) -> bool {
        rank < self.world_size
    }

    /// Iterate over every rank in the world.
    pub fn ranks(&self) -> impl Iterator<Item = Rank> {
        0..self.world_size
    }
}

impl fmt::Display for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank {}/{}", self.rank, self.world_size)
    }
}
