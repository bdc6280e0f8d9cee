//! Relay phases, rank roles and per-call relay state.
//!
//! Every rank walks the same phase sequence:
//!
//! ```text
//! BroadcastMeta ──declined──────────────────────────────┐
//!       │                                               ▼
//!       └─► BroadcastSize ─► Relay ─► BroadcastResult ─► Done
//! ```
//!
//! The role only decides what a rank contributes inside each phase.

use serde::Serialize;
use std::fmt;
use vnet_types::{DeclineReason, Path, Rank};

/// One step of the collective relay protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelayPhase {
    /// Request owner broadcasts `{source, destination, verdict, payload length}`.
    BroadcastMeta,
    /// Source broadcasts the payload length.
    BroadcastSize,
    /// Store-and-forward along the path; only path ranks take part.
    Relay,
    /// Destination makes the result visible to every rank.
    BroadcastResult,
    Done,
}

impl fmt::Display for RelayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayPhase::BroadcastMeta => "broadcast_meta",
            RelayPhase::BroadcastSize => "broadcast_size",
            RelayPhase::Relay => "relay",
            RelayPhase::BroadcastResult => "broadcast_result",
            RelayPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a rank does during the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    /// Seeds the payload and sends the first hop.
    Source,
    /// Receives one hop and forwards it.
    Intermediate,
    /// Receives the last hop and owns the result.
    Destination,
    /// Zero-hop route: the payload never moves.
    SourceAndDestination,
    /// Off the path: collectives only.
    Idle,
}

/// Per-rank state for one routing operation.
///
/// Created once the path is known and dropped when the call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayState {
    pub role: Role,
    pub on_path: bool,
    pub index_in_path: Option<usize>,
    /// Source: the seeded payload. Others: a zeroed buffer of the broadcast
    /// length until a hop fills it. Cleared by senders after forwarding.
    pub received_payload: Vec<i32>,
}

impl RelayState {
    /// Derive the state of `rank` for `path`, with an unfilled buffer.
    pub fn for_rank(path: &Path, rank: Rank) -> Self {
        let index_in_path = path.index_of(rank);
        let role = match index_in_path {
            None => Role::Idle,
            Some(_) if path.hops() == 0 => Role::SourceAndDestination,
            Some(0) => Role::Source,
            Some(i) if i == path.hops() => Role::Destination,
            Some(_) => Role::Intermediate,
        };
        Self {
            role,
            on_path: index_in_path.is_some(),
            index_in_path,
            received_payload: Vec::new(),
        }
    }

    /// Whether this rank starts with the payload.
    pub fn is_source(&self) -> bool {
        matches!(self.role, Role::Source | Role::SourceAndDestination)
    }

    /// Whether this rank ends up holding the delivered payload.
    pub fn is_destination(&self) -> bool {
        matches!(self.role, Role::Destination | Role::SourceAndDestination)
    }
}

/// The request owner's judgement, as broadcast in [`RelayPhase::BroadcastMeta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Declined(DeclineReason),
}

impl Verdict {
    pub fn code(self) -> u64 {
        match self {
            Verdict::Accepted => 0,
            Verdict::Declined(DeclineReason::InvalidTopologyShape) => 1,
            Verdict::Declined(DeclineReason::OutOfRangeRank) => 2,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Verdict::Accepted),
            1 => Some(Verdict::Declined(DeclineReason::InvalidTopologyShape)),
            2 => Some(Verdict::Declined(DeclineReason::OutOfRangeRank)),
            _ => None,
        }
    }
}
