//! Routing requests, hop paths and results.

use crate::Rank;
use serde::Serialize;
use std::fmt;

/// A request to move `payload` from `source` to `destination`.
///
/// Every rank passes its own view of the request to the router. The request
/// owner's `source`/`destination` are authoritative; only the source rank's
/// `payload` is ever read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingRequest {
    pub source: Rank,
    pub destination: Rank,
    pub payload: Vec<i32>,
}

impl RoutingRequest {
    /// Create a new routing request.
    pub fn new(source: Rank, destination: Rank, payload: Vec<i32>) -> Self {
        Self {
            source,
            destination,
            payload,
        }
    }
}

/// An ordered, non-empty sequence of ranks visited by a payload.
///
/// `path[0]` is the source, the last element is the destination, and every
/// consecutive pair is linked in the emulated topology. A single-element
/// path is the zero-hop route from a rank to itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Path(Vec<Rank>);

impl Path {
    /// Wrap a rank sequence. Returns `None` for an empty sequence.
    pub fn new(ranks: Vec<Rank>) -> Option<Self> {
        if ranks.is_empty() {
            None
        } else {
            Some(Self(ranks))
        }
    }

    /// The zero-hop path `[rank]`.
    pub fn single(rank: Rank) -> Self {
        Self(vec![rank])
    }

    /// Extend the path by one hop to `rank`.
    pub fn push(&mut self, rank: Rank) {
        self.0.push(rank);
    }

    pub fn source(&self) -> Rank {
        self.0[0]
    }

    pub fn destination(&self) -> Rank {
        self.0[self.0.len() - 1]
    }

    /// Number of point-to-point transfers along the path.
    pub fn hops(&self) -> usize {
        self.0.len() - 1
    }

    /// Number of ranks on the path, endpoints included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Position of `rank` on the path, if it is on it.
    pub fn index_of(&self, rank: Rank) -> Option<usize> {
        self.0.iter().position(|&r| r == rank)
    }

    pub fn contains(&self, rank: Rank) -> bool {
        self.0.contains(&rank)
    }

    pub fn as_slice(&self) -> &[Rank] {
        &self.0
    }

    /// Consecutive `(from, to)` pairs, one per hop.
    pub fn hop_pairs(&self) -> impl Iterator<Item = (Rank, Rank)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }

    pub fn into_inner(self) -> Vec<Rank> {
        self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for rank in &self.0 {
            if !first {
                write!(f, " -> ")?;
            }
            write!(f, "{rank}")?;
            first = false;
        }
        Ok(())
    }
}

/// The payload as delivered at the destination, plus the path it took.
///
/// After a routing operation completes every rank holds an identical copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingResult {
    pub delivered_payload: Vec<i32>,
    pub path: Path,
}

/// Why a routing operation was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    /// The world size does not fit the requested topology shape.
    InvalidTopologyShape,
    /// Source or destination is outside `[0, world_size)`.
    OutOfRangeRank,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclineReason::InvalidTopologyShape => write!(f, "invalid topology shape"),
            DeclineReason::OutOfRangeRank => write!(f, "out of range rank"),
        }
    }
}

/// Outcome of one collective routing operation.
///
/// Invalid requests are not errors: every rank uniformly declines and reports
/// the requested payload size unchanged, so batch drivers keep running.
/// Callers must not mistake a decline for a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteOutcome {
    Delivered(RoutingResult),
    Declined {
        reason: DeclineReason,
        requested_len: usize,
    },
}

impl RouteOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RouteOutcome::Delivered(_))
    }

    pub fn result(&self) -> Option<&RoutingResult> {
        match self {
            RouteOutcome::Delivered(result) => Some(result),
            RouteOutcome::Declined { .. } => None,
        }
    }

    pub fn into_result(self) -> Option<RoutingResult> {
        match self {
            RouteOutcome::Delivered(result) => Some(result),
            RouteOutcome::Declined { .. } => None,
        }
    }

    /// The scalar a batch driver records for this outcome.
    ///
    /// Delivered payload length on success, the requested length when the
    /// route was declined.
    pub fn fallback_value(&self) -> usize {
        match self {
            RouteOutcome::Delivered(result) => result.delivered_payload.len(),
            RouteOutcome::Declined { requested_len, .. } => *requested_len,
        }
    }
}
