//! Communicator trait for rank-addressed message passing.
//!
//! Defines the `Communicator` interface implemented by the in-process
//! backend (`vnet-network-memory`). The router only ever talks to this trait.

use crate::wire::WireError;
use thiserror::Error;
use vnet_types::Rank;

/// Tag distinguishing point-to-point channels between the same two ranks.
pub type Tag = u16;

/// Error returned when a communication call fails.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("rank {rank} out of bounds for world size {world_size}")]
    RankOutOfBounds { rank: Rank, world_size: u32 },

    #[error("peer {0} disconnected")]
    Disconnected(Rank),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

/// Blocking point-to-point and collective messaging between ranks.
///
/// Every rank owns exactly one communicator. The semantics follow the usual
/// SPMD model:
///
/// - `send` never blocks on the receiver; `recv` blocks until a matching
///   message arrives.
/// - Messages on one `(sender, receiver, tag)` channel arrive in send order.
///   A `recv` for one tag never consumes a message of another tag.
/// - `broadcast` and `barrier` are collective: every rank must call them, in
///   the same order, or the world deadlocks. There is no timeout.
pub trait Communicator: Send {
    /// This process's rank.
    fn rank(&self) -> Rank;

    /// Number of ranks in the world.
    fn world_size(&self) -> u32;

    /// Send `data` to rank `to` on channel `tag`.
    fn send(&self, to: Rank, tag: Tag, data: &[u8]) -> Result<(), CommError>;

    /// Receive the next message from rank `from` on channel `tag`.
    fn recv(&self, from: Rank, tag: Tag) -> Result<Vec<u8>, CommError>;

    /// Broadcast `data` from `root` to every rank.
    ///
    /// On the root the returned bytes are `data`; elsewhere `data` is ignored
    /// and the root's bytes are returned.
    fn broadcast(&self, root: Rank, data: Vec<u8>) -> Result<Vec<u8>, CommError>;

    /// Block until every rank has entered the barrier.
    fn barrier(&self) -> Result<(), CommError>;

    /// Fail with [`CommError::RankOutOfBounds`] unless `rank` is in this world.
    fn check_peer(&self, rank: Rank) -> Result<(), CommError> {
        if rank < self.world_size() {
            Ok(())
        } else {
            Err(CommError::RankOutOfBounds {
                rank,
                world_size: self.world_size(),
            })
        }
    }
}

/// Communicator for a world of one rank.
///
/// Broadcasts and barriers return immediately. Point-to-point traffic can
/// only target rank 0 itself and is looped back in FIFO order per tag.
#[derive(Debug, Default)]
pub struct SingleRankComm {
    loopback: std::sync::Mutex<std::collections::VecDeque<(Tag, Vec<u8>)>>,
}

impl SingleRankComm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Communicator for SingleRankComm {
    fn rank(&self) -> Rank {
        0
    }

    fn world_size(&self) -> u32 {
        1
    }

    fn send(&self, to: Rank, tag: Tag, data: &[u8]) -> Result<(), CommError> {
        self.check_peer(to)?;
        self.loopback
            .lock()
            .map_err(|_| CommError::Disconnected(0))?
            .push_back((tag, data.to_vec()));
        Ok(())
    }

    fn recv(&self, from: Rank, tag: Tag) -> Result<Vec<u8>, CommError> {
        self.check_peer(from)?;
        let mut queue = self.loopback.lock().map_err(|_| CommError::Disconnected(0))?;
        let position = queue
            .iter()
            .position(|(t, _)| *t == tag)
            // Nobody else could ever send: waiting would hang forever.
            .ok_or(CommError::Disconnected(from))?;
        Ok(queue.remove(position).map(|(_, data)| data).unwrap_or_default())
    }

    fn broadcast(&self, root: Rank, data: Vec<u8>) -> Result<Vec<u8>, CommError> {
        self.check_peer(root)?;
        Ok(data)
    }

    fn barrier(&self) -> Result<(), CommError> {
        Ok(())
    }
}
