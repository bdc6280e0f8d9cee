//! Router configuration.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use vnet_types::Rank;

/// How the destination makes the result visible to every rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dissemination {
    /// Destination broadcasts payload length, payload, path length and path.
    #[default]
    Chain,
    /// Recursive pairwise exchange, one round per hypercube dimension.
    ///
    /// Only the payload travels; every rank already planned the path. Falls
    /// back to [`Dissemination::Chain`] on non-hypercube topologies and for
    /// zero-hop routes.
    DimensionExchange,
}

impl fmt::Display for Dissemination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dissemination::Chain => write!(f, "chain"),
            Dissemination::DimensionExchange => write!(f, "dimension-exchange"),
        }
    }
}

impl FromStr for Dissemination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chain" | "broadcast" => Ok(Dissemination::Chain),
            "dimension-exchange" | "exchange" => Ok(Dissemination::DimensionExchange),
            other => Err(format!("unknown dissemination strategy: {other}")),
        }
    }
}

/// Router configuration.
///
/// Must be identical on every rank of a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterConfig {
    /// Rank whose view of `(source, destination)` is authoritative. It
    /// validates the request and broadcasts the verdict.
    pub request_owner: Rank,

    /// Result visibility strategy.
    pub dissemination: Dissemination,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_owner: 0,
            dissemination: Dissemination::Chain,
        }
    }
}

impl RouterConfig {
    /// Create a new router configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request owner.
    pub fn with_request_owner(mut self, owner: Rank) -> Self {
        self.request_owner = owner;
        self
    }

    /// Set the dissemination strategy.
    pub fn with_dissemination(mut self, dissemination: Dissemination) -> Self {
        self.dissemination = dissemination;
        self
    }
}
